//! Job - Scheduling context embedded in every schedulable job
//!
//! A job carries its own scheduling state: priority, per-round budget,
//! remaining quota, ready-queue link, home processor and helping edges.
//! Nothing is allocated: the ready queues link jobs through the embedded
//! [`LinkedListLink`] and the helping relation is threaded through the jobs
//! themselves.
//!
//! All interior state is plain [`Cell`]s. It is only ever touched with the
//! kernel lock held, which is what makes the `Sync` impl below sound.

use core::cell::Cell;
use core::fmt;
use core::ptr;

use intrusive_collections::{intrusive_adapter, LinkedListLink};
use log::debug;

use super::body::{CpuJob, JobKind, Thread, Vm};
use super::state::{JobState, Priority};
use crate::config::DEFAULT_QUOTA;
use crate::processor::CpuId;
use crate::scheduler::idle::Idle;
use crate::scheduler::ready_queue::QueueTag;
use crate::scheduler::{SchedulerError, SchedulerResult};

/// Execution budget in ticks, one tick being one scheduling interval
pub type Quota = u32;

/// Scheduling state of a helper, captured by [`Job::help`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Donation {
    pub priority: Priority,
    pub quota: Quota,
    pub queued: bool,
}

/// A schedulable job: thread, virtual machine or per-CPU idle
pub struct Job<'a> {
    link: LinkedListLink,
    label: &'static str,
    kind: JobKind,
    priority: Priority,

    /// Per-round allotment, copied into `quota` on replenish
    budget: Cell<Quota>,
    /// What is left of the current round
    quota: Cell<Quota>,
    state: Cell<JobState>,
    home: Cell<CpuId>,
    queue: Cell<Option<QueueTag>>,
    /// Ticks charged to this job's slot, including time spent helping
    consumed: Cell<u64>,

    helping: Cell<Option<&'a Job<'a>>>,
    first_helper: Cell<Option<&'a Job<'a>>>,
    next_helper: Cell<Option<&'a Job<'a>>>,
    donation: Cell<Option<Donation>>,
}

intrusive_adapter!(pub ReadyAdapter<'a> = &'a Job<'a>: Job<'a> { link: LinkedListLink });

// SAFETY: every Cell of a job, the intrusive link included, is written only
// through crate-internal methods reached from the scheduler, processor and
// pool, all of which run under the kernel lock. Readers on other cores go
// through `Kernel::with`. The execution traces of the bodies are atomics.
unsafe impl Sync for Job<'_> {}

impl<'a> Job<'a> {
    const fn with_kind(
        label: &'static str,
        kind: JobKind,
        priority: Priority,
        budget: Quota,
        home: CpuId,
    ) -> Self {
        Self {
            link: LinkedListLink::new(),
            label,
            kind,
            priority,
            budget: Cell::new(budget),
            quota: Cell::new(budget),
            state: Cell::new(JobState::Blocked),
            home: Cell::new(home),
            queue: Cell::new(None),
            consumed: Cell::new(0),
            helping: Cell::new(None),
            first_helper: Cell::new(None),
            next_helper: Cell::new(None),
            donation: Cell::new(None),
        }
    }

    /// Thread homed on the primary CPU
    pub const fn thread(label: &'static str, priority: Priority, budget: Quota) -> Self {
        Self::with_kind(label, JobKind::Thread(Thread::new()), priority, budget, CpuId::PRIMARY)
    }

    /// Thread with the default per-round allotment
    pub const fn default_thread(label: &'static str, priority: Priority) -> Self {
        Self::thread(label, priority, DEFAULT_QUOTA)
    }

    /// Virtual machine homed on the primary CPU
    pub const fn vm(label: &'static str, priority: Priority, budget: Quota) -> Self {
        Self::with_kind(label, JobKind::Vm(Vm::new()), priority, budget, CpuId::PRIMARY)
    }

    /// Idle job of `cpu`
    pub const fn idle(cpu: CpuId, fill: Quota) -> Self {
        Self::with_kind("idle", JobKind::Idle(Idle::new()), Priority::IDLE, fill, cpu)
    }

    /// Set the initial home processor
    ///
    /// Only meant for construction. A job that may already be queued moves
    /// through [`ProcessorPool::affinity`](crate::processor::ProcessorPool::affinity).
    pub fn on(self, cpu: CpuId) -> Self {
        self.home.set(cpu);
        self
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn kind(&self) -> &JobKind {
        &self.kind
    }

    pub fn is_idle(&self) -> bool {
        self.kind.is_idle()
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Remaining quota of the current round
    pub fn quota(&self) -> Quota {
        self.quota.get()
    }

    /// Per-round allotment
    pub fn budget(&self) -> Quota {
        self.budget.get()
    }

    /// Rebind the per-round allotment
    ///
    /// The running round keeps its remaining quota, the new value applies
    /// from the next replenish on.
    pub(crate) fn set_budget(&self, budget: Quota) {
        self.budget.set(budget);
    }

    pub fn state(&self) -> JobState {
        self.state.get()
    }

    /// Queued or running
    pub fn ready(&self) -> bool {
        self.state.get().is_schedulable()
    }

    pub fn home(&self) -> CpuId {
        self.home.get()
    }

    /// Ticks charged to this job so far
    pub fn consumed(&self) -> u64 {
        self.consumed.get()
    }

    pub fn is_queued(&self) -> bool {
        self.queue.get().is_some()
    }

    pub(crate) fn queue_tag(&self) -> Option<QueueTag> {
        self.queue.get()
    }

    pub(crate) fn set_queue_tag(&self, tag: Option<QueueTag>) {
        self.queue.set(tag);
    }

    pub(crate) fn is_linked(&self) -> bool {
        self.link.is_linked()
    }

    pub(crate) fn set_state(&self, state: JobState) {
        self.state.set(state);
    }

    pub(crate) fn set_home(&self, cpu: CpuId) {
        self.home.set(cpu);
    }

    /// Start a new round with the full allotment
    pub(crate) fn replenish(&self) {
        self.quota.set(self.budget.get());
    }

    pub(crate) fn grant(&self, quota: Quota) {
        self.quota.set(quota);
    }

    /// End the current round
    pub(crate) fn exhaust(&self) {
        self.quota.set(0);
    }

    /// Charge `ticks` to this job's slot
    pub(crate) fn consume(&self, ticks: Quota) {
        self.quota.set(self.quota.get().saturating_sub(ticks));
        self.consumed.set(self.consumed.get() + u64::from(ticks));
    }

    // ═══════════════════════════════════════════════════════════════
    // Helping
    // ═══════════════════════════════════════════════════════════════

    /// Donate this job's scheduling slot to `other`
    ///
    /// While helping, whenever this job's slot is selected the end of the
    /// donation chain executes instead, and the time is charged to this job.
    pub(crate) fn help(&'a self, other: &'a Job<'a>) -> SchedulerResult<()> {
        if self.is_idle() || other.is_idle() {
            return Err(SchedulerError::IdleCannotHelp);
        }
        if self.helping.get().is_some() {
            return Err(SchedulerError::AlreadyHelping { job: self.label });
        }
        if self.home() != other.home() {
            return Err(SchedulerError::CrossCpuHelp {
                helper: self.label,
                helpee: other.label,
            });
        }
        let mut next = Some(other);
        while let Some(job) = next {
            if ptr::eq(job, self) {
                return Err(SchedulerError::HelpingCycle { job: self.label });
            }
            next = job.helping.get();
        }

        self.donation.set(Some(Donation {
            priority: self.priority,
            quota: self.quota.get(),
            queued: self.is_queued(),
        }));
        self.helping.set(Some(other));
        self.next_helper.set(other.first_helper.get());
        other.first_helper.set(Some(self));

        debug!("job '{}' helps '{}'", self.label, other.label);
        Ok(())
    }

    /// Tear down the donation edge and restore the quota captured by
    /// [`Job::help`]
    ///
    /// Queue membership is restored by the owning scheduler, see
    /// [`Scheduler::helping_finished`](crate::scheduler::Scheduler::helping_finished).
    pub(crate) fn helping_finished(&self) -> Option<Donation> {
        let helpee = self.helping.take()?;

        let mut prev: Option<&'a Job<'a>> = None;
        let mut cursor = helpee.first_helper.get();
        while let Some(helper) = cursor {
            if ptr::eq(helper, self) {
                let after = self.next_helper.take();
                match prev {
                    Some(prev) => prev.next_helper.set(after),
                    None => helpee.first_helper.set(after),
                }
                break;
            }
            prev = Some(helper);
            cursor = helper.next_helper.get();
        }

        let donation = self.donation.take();
        if let Some(donation) = donation {
            self.quota.set(donation.quota);
        }
        debug!("job '{}' stops helping '{}'", self.label, helpee.label);
        donation
    }

    pub fn helping(&self) -> Option<&'a Job<'a>> {
        self.helping.get()
    }

    pub fn is_helping(&self) -> bool {
        self.helping.get().is_some()
    }

    /// Job that actually executes when this job's slot is selected
    pub fn helping_sink(&self) -> &Job<'a> {
        let mut job: &Job<'a> = self;
        while let Some(next) = job.helping.get() {
            job = next;
        }
        job
    }

    /// Visit every job currently donating directly to this one
    pub fn for_each_helper(&self, mut f: impl FnMut(&'a Job<'a>)) {
        let mut cursor = self.first_helper.get();
        while let Some(helper) = cursor {
            f(helper);
            cursor = helper.next_helper.get();
        }
    }

    pub fn helper_count(&self) -> usize {
        let mut count = 0;
        self.for_each_helper(|_| count += 1);
        count
    }
}

impl CpuJob for Job<'_> {
    fn exception(&self, cpu: CpuId) {
        self.kind.body().exception(cpu);
    }

    fn proceed(&self, cpu: CpuId) {
        self.kind.body().proceed(cpu);
    }
}

impl fmt::Debug for Job<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("label", &self.label)
            .field("kind", &self.kind.name())
            .field("priority", &self.priority)
            .field("quota", &self.quota.get())
            .field("budget", &self.budget.get())
            .field("state", &self.state.get())
            .field("home", &self.home.get())
            .field("helping", &self.helping.get().map(|job| job.label))
            .finish()
    }
}

impl fmt::Display for Job<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.name(), self.label)
    }
}
