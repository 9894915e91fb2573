//! Processor - one physical core and its scheduler
//!
//! Handles:
//! - Kernel entry: charging elapsed time, dispatching pending interrupts
//! - Kernel exit: picking the next job and programming the one-shot timer
//! - Inter-processor interrupts (IPI), collapsed while one is pending

pub mod pool;

pub use pool::ProcessorPool;

use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use log::{debug, trace};

use crate::arch::{Irq, Pic, Timer};
use crate::scheduler::{CpuJob, Job, Quota, Scheduler};

/// Index of a core within the processor pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CpuId(usize);

impl CpuId {
    /// Core 0, home of every job built without an explicit one
    pub const PRIMARY: Self = Self(0);

    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for CpuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cpu{}", self.0)
    }
}

/// Board collaborators shared by every processor
#[derive(Clone, Copy)]
pub struct Drivers<'a> {
    pub pic: &'a dyn Pic,
    pub timer: &'a dyn Timer,
    pub irq: &'a dyn Irq,
}

/// Processor state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProcessorState {
    /// Executing a job outside the kernel
    Running = 0,
    /// Between kernel entry and the next job resuming
    EnteringKernel = 1,
}

/// IPI counters of one processor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IpiStats {
    /// IPIs raised towards this processor
    pub sent: u64,
    /// Requests dropped because an IPI was still pending
    pub collapsed: u64,
}

pub struct Processor<'a> {
    id: CpuId,
    state: ProcessorState,
    scheduler: Scheduler<'a>,
    drivers: Drivers<'a>,

    /// Set while an IPI towards this core is in flight
    ip_interrupt_pending: AtomicBool,
    ipi_sent: AtomicU64,
    ipi_collapsed: AtomicU64,
}

impl<'a> Processor<'a> {
    /// Create processor `id` together with its idle job
    pub fn new(id: CpuId, fill: Quota, drivers: Drivers<'a>) -> Self {
        Self {
            id,
            state: ProcessorState::Running,
            scheduler: Scheduler::new(id, Job::idle(id, fill), fill),
            drivers,
            ip_interrupt_pending: AtomicBool::new(false),
            ipi_sent: AtomicU64::new(0),
            ipi_collapsed: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> CpuId {
        self.id
    }

    pub fn state(&self) -> ProcessorState {
        self.state
    }

    pub fn scheduler(&self) -> &Scheduler<'a> {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler<'a> {
        &mut self.scheduler
    }

    /// Job whose code runs on this core, after helping is resolved
    pub fn current_job(&self) -> &Job<'a> {
        self.scheduler.head().helping_sink()
    }

    /// Make a job homed on this core ready
    pub fn schedule(&mut self, job: &'a Job<'a>) {
        self.scheduler.insert(job);
    }

    /// Charge the time the selected job ran since the timer was programmed
    pub fn enter_kernel(&mut self) {
        self.state = ProcessorState::EnteringKernel;
        let ticks = self.drivers.timer.elapsed(self.id);
        self.scheduler.consume(ticks);
    }

    /// Drain and acknowledge the pending interrupt requests of this core
    pub fn handle_interrupts(&mut self) {
        let timer_irq = self.drivers.timer.interrupt_id(self.id);

        while let Some(irq) = self.drivers.pic.take_request() {
            if irq == timer_irq {
                self.scheduler.yield_current();
                self.drivers.timer.clear_interrupt(self.id);
            } else if self.drivers.pic.is_ip_interrupt(irq, self.id) {
                self.ip_interrupt_pending.store(false, Ordering::Release);
                trace!("[{}] IPI", self.id);
            } else {
                self.drivers.irq.occurred(irq);
            }
            self.drivers.pic.finish_request();
        }
    }

    /// Pick the next job, arm the timer with its quota and return the job
    /// that actually executes
    pub fn schedule_next(&mut self) -> &Job<'a> {
        self.scheduler.current();
        self.drivers
            .timer
            .start_one_shot(self.id, self.scheduler.head_quota());
        self.state = ProcessorState::Running;
        self.scheduler.head().helping_sink()
    }

    /// Full kernel entry: returns the job to resume
    pub fn kernel_entry(&mut self) -> &Job<'a> {
        self.enter_kernel();
        self.current_job().exception(self.id);
        self.handle_interrupts();
        self.schedule_next()
    }

    /// Raise an IPI towards this core unless one is already pending
    ///
    /// Returns whether an IPI was actually sent.
    pub fn trigger_ip_interrupt(&self) -> bool {
        if self.ip_interrupt_pending.swap(true, Ordering::AcqRel) {
            self.ipi_collapsed.fetch_add(1, Ordering::Relaxed);
            trace!("[{}] IPI already pending", self.id);
            return false;
        }
        self.drivers.pic.trigger_ip_interrupt(self.id);
        self.ipi_sent.fetch_add(1, Ordering::Relaxed);
        debug!("[{}] IPI sent", self.id);
        true
    }

    pub fn ip_interrupt_pending(&self) -> bool {
        self.ip_interrupt_pending.load(Ordering::Acquire)
    }

    pub fn ipi_stats(&self) -> IpiStats {
        IpiStats {
            sent: self.ipi_sent.load(Ordering::Relaxed),
            collapsed: self.ipi_collapsed.load(Ordering::Relaxed),
        }
    }
}
