//! Architecture abstraction
//!
//! The scheduler never touches interrupt controllers or timers directly.
//! The board layer implements these traits and hands them to the
//! processor pool at bring-up.

use crate::processor::CpuId;

/// Interrupt line number as reported by the interrupt controller
pub type IrqId = u32;

/// Timer ticks, the unit quotas are expressed in
pub type Ticks = u32;

/// Interrupt controller
pub trait Pic: Sync {
    /// Next pending request of the calling core, if any
    fn take_request(&self) -> Option<IrqId>;

    /// Acknowledge the request last returned by [`Pic::take_request`]
    fn finish_request(&self);

    /// Raise the inter-processor interrupt of `cpu`
    fn trigger_ip_interrupt(&self, cpu: CpuId);

    /// Whether `irq` is the inter-processor interrupt of `cpu`
    fn is_ip_interrupt(&self, irq: IrqId, cpu: CpuId) -> bool;
}

/// Per-core one-shot timer
pub trait Timer: Sync {
    fn interrupt_id(&self, cpu: CpuId) -> IrqId;

    fn clear_interrupt(&self, cpu: CpuId);

    /// Fire the timer interrupt of `cpu` after `ticks`
    fn start_one_shot(&self, cpu: CpuId, ticks: Ticks);

    /// Ticks since the last [`Timer::start_one_shot`] on `cpu`
    fn elapsed(&self, cpu: CpuId) -> Ticks;
}

/// Sink for device interrupts
pub trait Irq: Sync {
    fn occurred(&self, irq: IrqId);
}

/// Starts a secondary core at `entry`
pub trait CoreStarter {
    fn start(&self, cpu: CpuId, entry: usize);
}
