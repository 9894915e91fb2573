//! Kernel lock
//!
//! Every scheduling operation runs under this single spin lock, held for
//! the duration of one kernel entry or one system call. Nothing inside
//! blocks, so the lock is never held across a suspension point.

use spin::{Mutex, MutexGuard};

use crate::processor::{CpuId, ProcessorPool};
use crate::scheduler::{Donation, Job, Quota, SchedulerResult};

/// The processor pool behind the kernel lock
pub struct Kernel<'a, const N: usize> {
    pool: Mutex<ProcessorPool<'a, N>>,
}

impl<'a, const N: usize> Kernel<'a, N> {
    pub const fn new(pool: ProcessorPool<'a, N>) -> Self {
        Self {
            pool: Mutex::new(pool),
        }
    }

    /// Take the kernel lock
    pub fn lock(&self) -> MutexGuard<'_, ProcessorPool<'a, N>> {
        self.pool.lock()
    }

    /// Run `f` with the kernel lock held
    pub fn with<R>(&self, f: impl FnOnce(&mut ProcessorPool<'a, N>) -> R) -> R {
        f(&mut self.pool.lock())
    }

    pub fn schedule(&self, on: CpuId, job: &'a Job<'a>) {
        self.pool.lock().schedule(on, job);
    }

    pub fn block(&self, job: &'a Job<'a>) {
        self.pool.lock().block(job);
    }

    pub fn yield_current(&self, cpu: CpuId) {
        self.pool.lock().yield_current(cpu);
    }

    pub fn affinity(&self, job: &'a Job<'a>, cpu: CpuId) -> SchedulerResult<()> {
        self.pool.lock().affinity(job, cpu)
    }

    pub fn help(&self, helper: &'a Job<'a>, helpee: &'a Job<'a>) -> SchedulerResult<()> {
        self.pool.lock().help(helper, helpee)
    }

    pub fn set_budget(&self, job: &'a Job<'a>, budget: Quota) {
        self.pool.lock().set_budget(job, budget);
    }

    pub fn helping_finished(&self, job: &'a Job<'a>) -> Option<Donation> {
        self.pool.lock().helping_finished(job)
    }

    /// Kernel entry on `cpu`; returns the label of the resumed job
    pub fn exception(&self, cpu: CpuId) -> &'static str {
        self.pool.lock().exception(cpu).label()
    }
}
