//! Processor pool - the fixed set of cores
//!
//! Built once on the primary core before any core schedules. Operations
//! that touch more than one scheduler (remote wake-up, migration, end of
//! helping) live here, since they need the whole pool under the kernel
//! lock.

use log::{debug, error, info, warn};

use super::{CpuId, Drivers, Processor};
use crate::arch::CoreStarter;
use crate::config::SchedulerConfig;
use crate::scheduler::{CpuJob, Donation, Job, Quota, SchedulerError, SchedulerResult};

pub struct ProcessorPool<'a, const N: usize> {
    processors: [Processor<'a>; N],
    config: SchedulerConfig,
}

#[cold]
fn cpu_out_of_range(cpu: CpuId, count: usize) -> ! {
    error!("processor {} requested, pool has {}", cpu, count);
    panic!("processor {} out of range ({} processors)", cpu, count);
}

impl<'a, const N: usize> ProcessorPool<'a, N> {
    /// Build every processor and its idle job
    pub fn new(config: SchedulerConfig, drivers: Drivers<'a>) -> SchedulerResult<Self> {
        config.validate(N)?;

        let processors =
            core::array::from_fn(|index| Processor::new(CpuId::new(index), config.fill_quota, drivers));
        info!(
            "processor pool: {} cores, primary cpu{}, fill quota {}",
            N, config.primary_cpu, config.fill_quota
        );
        Ok(Self { processors, config })
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    pub const fn len(&self) -> usize {
        N
    }

    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// Processor `cpu`; fatal when out of range
    pub fn processor(&self, cpu: CpuId) -> &Processor<'a> {
        match self.processors.get(cpu.index()) {
            Some(processor) => processor,
            None => cpu_out_of_range(cpu, N),
        }
    }

    pub fn processor_mut(&mut self, cpu: CpuId) -> &mut Processor<'a> {
        match self.processors.get_mut(cpu.index()) {
            Some(processor) => processor,
            None => cpu_out_of_range(cpu, N),
        }
    }

    /// Fallible lookup for ids coming from outside the kernel
    pub fn try_processor(&self, cpu: CpuId) -> SchedulerResult<&Processor<'a>> {
        self.processors.get(cpu.index()).ok_or(SchedulerError::CpuNotAvailable {
            cpu_id: cpu.index(),
            count: N,
        })
    }

    pub fn primary_cpu(&self) -> CpuId {
        CpuId::new(self.config.primary_cpu)
    }

    pub fn primary_processor(&self) -> &Processor<'a> {
        self.processor(self.primary_cpu())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Processor<'a>> {
        self.processors.iter()
    }

    /// Make `job` ready on its home core, called from core `on`
    ///
    /// A remote wake-up that outdates the home core's selection raises an
    /// IPI there, unless one is already pending.
    pub fn schedule(&mut self, on: CpuId, job: &'a Job<'a>) {
        let home = job.home();
        if home == on {
            self.processor_mut(on).schedule(job);
            return;
        }

        let target = self.processor_mut(home);
        if target.scheduler_mut().insert_and_check(job) {
            debug!("[{}] wakes {} on {}", on, job, home);
            target.trigger_ip_interrupt();
        }
    }

    /// Take `job` out of scheduling, wherever it is queued
    pub fn block(&mut self, job: &Job<'a>) {
        let cpu = job.queue_tag().map_or(job.home(), |tag| tag.cpu);
        self.processor_mut(cpu).scheduler_mut().remove(job);
    }

    /// Rehome `job` on `cpu`
    ///
    /// The job leaves its current queue and is not queued on `cpu` until it
    /// is scheduled again.
    pub fn affinity(&mut self, job: &'a Job<'a>, cpu: CpuId) -> SchedulerResult<()> {
        self.try_processor(cpu)?;
        if job.is_idle() {
            warn!("idle job of {} cannot migrate", job.home());
            return Ok(());
        }
        self.block(job);
        job.set_home(cpu);
        debug!("{} rehomed on {}", job, cpu);
        Ok(())
    }

    /// Let `helper` donate its slot to `helpee`
    ///
    /// Both jobs must be homed on the same core.
    pub fn help(&mut self, helper: &'a Job<'a>, helpee: &'a Job<'a>) -> SchedulerResult<()> {
        self.processor_mut(helper.home()).scheduler_mut().help(helper, helpee)
    }

    /// Rebind the per-round allotment of `job`, effective at its next
    /// replenish
    pub fn set_budget(&mut self, job: &Job<'a>, budget: Quota) {
        self.processor_mut(job.home()).scheduler_mut().set_budget(job, budget);
    }

    /// End the donation of `job` and restore its queue membership
    pub fn helping_finished(&mut self, job: &'a Job<'a>) -> Option<Donation> {
        self.processor_mut(job.home()).scheduler_mut().helping_finished(job)
    }

    /// End the round of the job selected on `cpu`
    pub fn yield_current(&mut self, cpu: CpuId) {
        self.processor_mut(cpu).scheduler_mut().yield_current();
    }

    /// Exception or interrupt on `cpu`: run the kernel entry and resume the
    /// job picked for it
    pub fn exception(&mut self, cpu: CpuId) -> &Job<'a> {
        let job = self.processor_mut(cpu).kernel_entry();
        job.proceed(cpu);
        job
    }

    /// Ask `starter` to start every core but the primary one at `entry`
    pub fn start_secondaries(&self, starter: &dyn CoreStarter, entry: usize) {
        let primary = self.primary_cpu();
        for processor in self.processors.iter().filter(|p| p.id() != primary) {
            info!("starting {} at {:#x}", processor.id(), entry);
            starter.start(processor.id(), entry);
        }
    }
}
