//! Mock board shared by the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::vec::Vec;

use hw_sched::arch::{CoreStarter, Irq, IrqId, Pic, Timer};
use hw_sched::{CpuId, Drivers, Priority};
use spin::Mutex;

pub const TIMER_IRQ: IrqId = 30;
const IPI_BASE: IrqId = 1;

pub fn ipi_of(cpu: CpuId) -> IrqId {
    IPI_BASE + cpu.index() as IrqId
}

pub fn prio(level: u8) -> Priority {
    Priority::new(level).unwrap()
}

/// Interrupt controller, timer, device sink and core starter in one
#[derive(Default)]
pub struct Board {
    pending: Mutex<VecDeque<IrqId>>,
    finished: AtomicU32,
    ipis: Mutex<Vec<CpuId>>,
    armed: Mutex<Vec<(CpuId, u32)>>,
    elapsed: AtomicU32,
    devices: Mutex<Vec<IrqId>>,
    started: Mutex<Vec<(CpuId, usize)>>,
}

impl Board {
    pub fn drivers(&self) -> Drivers<'_> {
        Drivers {
            pic: self,
            timer: self,
            irq: self,
        }
    }

    /// Queue a request for the next kernel entry
    pub fn raise(&self, irq: IrqId) {
        self.pending.lock().push_back(irq);
    }

    /// Let the running job execute for `ticks` before the next entry
    pub fn run_for(&self, ticks: u32) {
        self.elapsed.store(ticks, Ordering::Relaxed);
    }

    pub fn finished(&self) -> u32 {
        self.finished.load(Ordering::Relaxed)
    }

    pub fn ipis(&self) -> Vec<CpuId> {
        self.ipis.lock().clone()
    }

    pub fn devices(&self) -> Vec<IrqId> {
        self.devices.lock().clone()
    }

    pub fn started(&self) -> Vec<(CpuId, usize)> {
        self.started.lock().clone()
    }

    /// Last one-shot programmed on `cpu`
    pub fn armed(&self, cpu: CpuId) -> Option<u32> {
        self.armed
            .lock()
            .iter()
            .rev()
            .find(|(armed_cpu, _)| *armed_cpu == cpu)
            .map(|(_, ticks)| *ticks)
    }
}

impl Pic for Board {
    fn take_request(&self) -> Option<IrqId> {
        self.pending.lock().pop_front()
    }

    fn finish_request(&self) {
        self.finished.fetch_add(1, Ordering::Relaxed);
    }

    fn trigger_ip_interrupt(&self, cpu: CpuId) {
        self.ipis.lock().push(cpu);
    }

    fn is_ip_interrupt(&self, irq: IrqId, cpu: CpuId) -> bool {
        irq == ipi_of(cpu)
    }
}

impl Timer for Board {
    fn interrupt_id(&self, _cpu: CpuId) -> IrqId {
        TIMER_IRQ
    }

    fn clear_interrupt(&self, _cpu: CpuId) {}

    fn start_one_shot(&self, cpu: CpuId, ticks: u32) {
        self.armed.lock().push((cpu, ticks));
    }

    fn elapsed(&self, _cpu: CpuId) -> u32 {
        self.elapsed.swap(0, Ordering::Relaxed)
    }
}

impl Irq for Board {
    fn occurred(&self, irq: IrqId) {
        self.devices.lock().push(irq);
    }
}

impl CoreStarter for Board {
    fn start(&self, cpu: CpuId, entry: usize) {
        self.started.lock().push((cpu, entry));
    }
}
