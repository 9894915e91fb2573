//! Scheduler Core - per-CPU priority round robin with quotas
//!
//! One instance per CPU. Ready jobs sit in one intrusive FIFO per priority
//! level; the idle job of the CPU is owned here and never queued.
//!
//! # Pick-next
//! 1. A previously selected job that used up its quota is replenished and
//!    moved to the tail of its queue. One that still has quota keeps its
//!    place, so a preempted job resumes first once it is on top again.
//! 2. Levels are scanned from most to least urgent. A head with quota is
//!    selected; a head without quota is replenished, moved to the tail and
//!    the scan goes on.
//! 3. Coming back to the first head examined at a level after a pass that
//!    refilled nobody means nobody there can run, and the scan moves down
//!    one level. If all levels fail while jobs are ready, every ready job
//!    gets the fill quota (idle round) and the scan is retried once.
//!    Failing again is fatal.
//! 4. Insertions reset the rotation marker.
//!
//! A selected job whose helping chain ends in a blocked job cannot run:
//! its slot is withdrawn until the donation ends, and the pick starts over.
//!
//! All methods run with the kernel lock held and never block.

use core::ptr;
use core::sync::atomic::{AtomicU64, Ordering};

use log::{debug, trace};

use super::statistics::{SchedulerStats, StatsSnapshot};
use crate::config::PRIORITY_LEVELS;
use crate::processor::CpuId;
use crate::scheduler::job::{Donation, Job, JobState, Priority, Quota};
use crate::scheduler::ready_queue::{QueueTag, ReadyQueue};
use crate::scheduler::SchedulerResult;
use crate::sched_assert;

/// Source of scheduler identities stamped into queue tags
static NEXT_OWNER: AtomicU64 = AtomicU64::new(0);

/// Ready queues and selection state of one CPU
pub struct Scheduler<'a> {
    cpu: CpuId,
    idle: Job<'a>,

    /// One queue per level; the idle level stays empty
    queues: [ReadyQueue<'a>; PRIORITY_LEVELS],

    /// Last selection, `None` while the idle job runs
    head: Option<&'a Job<'a>>,

    /// First head examined at the level being scanned
    rotation_marker: Option<&'a Job<'a>>,

    /// Quota every ready job receives in an idle round
    fill: Quota,

    stats: SchedulerStats,
}

impl<'a> Scheduler<'a> {
    /// Create the scheduler of `cpu` around its idle job
    pub fn new(cpu: CpuId, idle: Job<'a>, fill: Quota) -> Self {
        sched_assert!(idle.is_idle(), "[{}] scheduler built around '{}'", cpu, idle.label());
        idle.set_state(JobState::Running);
        let owner = NEXT_OWNER.fetch_add(1, Ordering::Relaxed);

        Self {
            cpu,
            idle,
            queues: core::array::from_fn(|level| {
                ReadyQueue::new(QueueTag {
                    cpu,
                    priority: Priority::from_level(level),
                    owner,
                })
            }),
            head: None,
            rotation_marker: None,
            fill,
            stats: SchedulerStats::new(),
        }
    }

    pub fn cpu(&self) -> CpuId {
        self.cpu
    }

    pub fn idle(&self) -> &Job<'a> {
        &self.idle
    }

    /// Make `job` ready with a fresh quota, behind the jobs of its level
    ///
    /// Idle jobs and jobs that are already queued are left alone.
    pub fn insert(&mut self, job: &'a Job<'a>) {
        if job.is_idle() || job.is_queued() {
            return;
        }
        job.replenish();
        self.queues[job.priority().level()].insert_tail(job);
        job.set_state(JobState::Ready);
        self.rotation_marker = None;

        debug!("[{}] insert {} at {} (quota {})", self.cpu, job, job.priority(), job.quota());
    }

    /// [`Scheduler::insert`] and report whether the insertion outdates the
    /// current selection
    ///
    /// True if `job` is strictly more urgent than the selected job or the
    /// CPU is idle. A remote CPU uses the answer to decide on an IPI.
    pub fn insert_and_check(&mut self, job: &'a Job<'a>) -> bool {
        if job.is_idle() || job.is_queued() {
            return false;
        }
        self.insert(job);

        match self.head {
            None => true,
            Some(head) => job.priority().is_more_urgent_than(head.priority()),
        }
    }

    /// Take `job` out of scheduling
    ///
    /// No-op for idle jobs and jobs not queued here.
    pub fn remove(&mut self, job: &Job<'a>) {
        if job.is_idle() || !self.queues[job.priority().level()].remove(job) {
            return;
        }
        job.set_state(JobState::Blocked);

        if self.head.map_or(false, |head| ptr::eq(head, job)) {
            self.head = None;
        }
        if self.rotation_marker.map_or(false, |marker| ptr::eq(marker, job)) {
            self.rotation_marker = None;
        }

        debug!("[{}] remove {}", self.cpu, job);
    }

    /// Pick the job to run next
    ///
    /// Never fails: the idle job is returned when nothing is ready.
    pub fn current(&mut self) -> &Job<'a> {
        loop {
            let next = self.select();
            match next {
                Some(job) if !job.helping_sink().ready() => {
                    debug!("[{}] {} helps a blocked job, slot withdrawn", self.cpu, job);
                    self.remove(job);
                }
                _ => {
                    self.switch_to(next);
                    return self.head();
                }
            }
        }
    }

    fn select(&mut self) -> Option<&'a Job<'a>> {
        if let Some(prev) = self.head {
            let queue = &mut self.queues[prev.priority().level()];
            if prev.quota() == 0 && queue.contains(prev) {
                prev.replenish();
                queue.move_to_tail(prev);
            }
        }

        match self.pick() {
            Some(job) => Some(job),
            None if self.has_ready() => {
                self.idle_round();
                let retry = self.pick();
                sched_assert!(retry.is_some(), "[{}] no ready job after idle round", self.cpu);
                retry
            }
            None => None,
        }
    }

    fn pick(&mut self) -> Option<&'a Job<'a>> {
        for priority in Priority::queued_levels() {
            let queue = &mut self.queues[priority.level()];
            self.rotation_marker = None;
            let mut refilled = false;

            while let Some(head) = queue.head() {
                if head.quota() > 0 {
                    self.rotation_marker = None;
                    return Some(head);
                }
                match self.rotation_marker {
                    Some(marker) if ptr::eq(marker, head) => {
                        if !refilled {
                            break;
                        }
                        refilled = false;
                    }
                    Some(_) => {}
                    None => self.rotation_marker = Some(head),
                }
                head.replenish();
                refilled |= head.quota() > 0;
                queue.move_to_tail(head);
            }
        }
        self.rotation_marker = None;
        None
    }

    /// Grant every ready job the fill quota at once
    fn idle_round(&mut self) {
        let fill = self.fill;
        for queue in self.queues.iter() {
            queue.for_each(|job| job.grant(fill));
        }
        self.stats.record_idle_round();
        debug!("[{}] idle round, fill {}", self.cpu, fill);
    }

    fn switch_to(&mut self, next: Option<&'a Job<'a>>) {
        let switched = match (self.head, next) {
            (Some(prev), Some(next)) => !ptr::eq(prev, next),
            (None, None) => false,
            _ => true,
        };

        if switched {
            if let Some(prev) = self.head {
                prev.set_state(JobState::Ready);
            }
            match next {
                Some(next) => {
                    next.set_state(JobState::Running);
                    self.idle.set_state(JobState::Ready);
                }
                None => self.idle.set_state(JobState::Running),
            }
            trace!("[{}] switch {} -> {}", self.cpu, self.head(), next.map_or(&self.idle, |job| job));
        }

        self.head = next;
        self.stats.record_pick(switched, next.is_none());
    }

    /// Last selection, without picking again
    pub fn head(&self) -> &Job<'a> {
        match self.head {
            Some(job) => job,
            None => &self.idle,
        }
    }

    /// Slice the timer is programmed with for the last selection
    pub fn head_quota(&self) -> Quota {
        match self.head {
            Some(job) => job.quota(),
            None => self.idle.budget(),
        }
    }

    /// Whether the idle job is the last selection
    pub fn is_idle(&self) -> bool {
        self.head.is_none()
    }

    /// End the round of the selected job
    pub fn yield_current(&mut self) {
        if let Some(head) = self.head {
            head.exhaust();
            self.stats.record_yield();
        }
    }

    /// Charge `ticks` of execution to the selected job
    pub fn consume(&mut self, ticks: Quota) {
        if ticks == 0 {
            return;
        }
        if let Some(head) = self.head {
            head.consume(ticks);
            self.stats.record_consumed(ticks);
        }
    }

    /// Whether `job` is queued on this CPU
    pub fn contains(&self, job: &Job<'a>) -> bool {
        self.queues[job.priority().level()].contains(job)
    }

    pub fn has_ready(&self) -> bool {
        self.queues.iter().any(|queue| !queue.is_empty())
    }

    pub fn ready_count(&self) -> usize {
        self.queues.iter().map(ReadyQueue::len).sum()
    }

    /// Visit the ready jobs, most urgent level first, FIFO within a level
    pub fn for_each_ready(&self, mut f: impl FnMut(&'a Job<'a>)) {
        for priority in Priority::queued_levels() {
            self.queues[priority.level()].for_each(&mut f);
        }
    }

    /// Let `helper` donate its slot to `helpee`, both homed on this CPU
    pub fn help(&mut self, helper: &'a Job<'a>, helpee: &'a Job<'a>) -> SchedulerResult<()> {
        helper.help(helpee)
    }

    /// Rebind the per-round allotment of `job`, effective at its next
    /// replenish
    pub fn set_budget(&mut self, job: &Job<'a>, budget: Quota) {
        job.set_budget(budget);
    }

    /// Tear down the donation of `job` and restore its queue membership
    ///
    /// `job` must be homed on this CPU.
    pub fn helping_finished(&mut self, job: &'a Job<'a>) -> Option<Donation> {
        let donation = job.helping_finished()?;

        match (donation.queued, job.is_queued()) {
            (true, false) => {
                self.queues[job.priority().level()].insert_tail(job);
                job.set_state(JobState::Ready);
                self.rotation_marker = None;
            }
            (false, true) => self.remove(job),
            _ => {}
        }
        Some(donation)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn utilization(&self) -> u8 {
        self.stats.utilization()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    fn prio(level: u8) -> Priority {
        Priority::new(level).unwrap()
    }

    fn scheduler<'a>() -> Scheduler<'a> {
        Scheduler::new(CpuId::PRIMARY, Job::idle(CpuId::PRIMARY, 5), 1)
    }

    /// Run the selected job until its quota is gone, then pick again
    fn finish_round<'s, 'a>(sched: &'s mut Scheduler<'a>) -> &'s Job<'a> {
        let quota = sched.head_quota();
        sched.consume(quota);
        sched.current()
    }

    #[test]
    fn test_empty_scheduler_picks_idle() {
        let mut sched = scheduler();
        assert!(sched.current().is_idle());
        assert!(sched.is_idle());
        assert_eq!(sched.head_quota(), 5);
        assert_eq!(sched.idle().state(), JobState::Running);
    }

    #[test]
    fn test_fifo_then_rotation_with_fresh_quota() {
        let a = Job::thread("a", prio(2), 10);
        let b = Job::thread("b", prio(2), 10);
        let mut sched = scheduler();
        sched.insert(&a);
        sched.insert(&b);

        assert!(ptr::eq(sched.current(), &a));
        assert_eq!(a.state(), JobState::Running);

        sched.consume(10);
        assert_eq!(a.quota(), 0);
        assert!(ptr::eq(sched.current(), &b));
        assert_eq!(a.quota(), 10);
        assert_eq!(a.state(), JobState::Ready);
    }

    #[test]
    fn test_preempted_job_keeps_its_place() {
        let a = Job::thread("a", prio(2), 10);
        let b = Job::thread("b", prio(2), 10);
        let c = Job::thread("c", prio(5), 10);
        let mut sched = scheduler();
        sched.insert(&a);
        sched.insert(&b);
        assert!(ptr::eq(sched.current(), &a));
        sched.consume(4);

        assert!(sched.insert_and_check(&c));
        assert!(ptr::eq(sched.current(), &c));
        sched.remove(&c);

        assert!(ptr::eq(sched.current(), &a));
        assert_eq!(a.quota(), 6);
    }

    #[test]
    fn test_insert_and_check_predicate() {
        let a = Job::thread("a", prio(3), 10);
        let same = Job::thread("same", prio(3), 10);
        let low = Job::thread("low", prio(1), 10);
        let high = Job::thread("high", prio(4), 10);
        let mut sched = scheduler();

        assert!(sched.insert_and_check(&a), "idle CPU is always outdated");
        sched.current();
        assert!(!sched.insert_and_check(&same));
        assert!(!sched.insert_and_check(&low));
        assert!(sched.insert_and_check(&high));
        assert!(!sched.insert_and_check(&high), "already queued");
    }

    #[test]
    fn test_insert_ignores_idle_and_queued() {
        let other_idle = Job::idle(CpuId::new(1), 1);
        let a = Job::thread("a", prio(3), 10);
        let mut sched = scheduler();

        sched.insert(&other_idle);
        assert!(!sched.has_ready());

        sched.insert(&a);
        sched.current();
        sched.consume(3);
        sched.insert(&a);
        assert_eq!(a.quota(), 7, "re-insert must not refresh the quota");
        assert_eq!(sched.ready_count(), 1);
    }

    #[test]
    fn test_remove_twice() {
        let a = Job::thread("a", prio(2), 10);
        let b = Job::thread("b", prio(2), 10);
        let mut sched = scheduler();
        sched.insert(&a);
        sched.insert(&b);

        sched.remove(&b);
        sched.remove(&b);
        assert_eq!(b.state(), JobState::Blocked);
        assert!(!b.ready());

        for _ in 0..4 {
            assert!(ptr::eq(finish_round(&mut sched), &a));
        }
    }

    #[test]
    fn test_removing_selected_job_falls_back() {
        let a = Job::thread("a", prio(2), 10);
        let mut sched = scheduler();
        sched.insert(&a);
        sched.current();

        sched.remove(&a);
        assert!(sched.is_idle());
        assert!(sched.current().is_idle());
    }

    #[test]
    fn test_zero_budget_jobs_get_idle_round() {
        let a = Job::thread("a", prio(4), 0);
        let b = Job::thread("b", prio(2), 0);
        let mut sched = scheduler();
        sched.insert(&a);
        sched.insert(&b);

        assert!(ptr::eq(sched.current(), &a));
        assert_eq!(a.quota(), 1);
        assert_eq!(b.quota(), 1);
        assert_eq!(sched.stats().idle_rounds, 1);

        assert!(ptr::eq(finish_round(&mut sched), &b));
        assert_eq!(sched.stats().idle_rounds, 1);
    }

    #[test]
    fn test_exhausted_level_yields_to_lower_level() {
        let fill_only = Job::thread("fill", prio(6), 0);
        let worker = Job::thread("worker", prio(2), 10);
        let mut sched = scheduler();
        sched.insert(&fill_only);
        sched.insert(&worker);

        assert!(ptr::eq(sched.current(), &worker));
        assert_eq!(sched.stats().idle_rounds, 0);
    }

    #[test]
    fn test_round_fairness() {
        let jobs = [
            Job::thread("a", prio(3), 2),
            Job::thread("b", prio(3), 2),
            Job::thread("c", prio(3), 2),
        ];
        let mut sched = scheduler();
        for job in jobs.iter() {
            sched.insert(job);
        }

        let mut order = Vec::new();
        order.push(sched.current().label());
        for _ in 0..5 {
            order.push(finish_round(&mut sched).label());
        }
        assert_eq!(order, ["a", "b", "c", "a", "b", "c"]);
    }

    #[test]
    fn test_yield_ends_round() {
        let a = Job::thread("a", prio(2), 10);
        let b = Job::thread("b", prio(2), 10);
        let mut sched = scheduler();
        sched.insert(&a);
        sched.insert(&b);
        sched.current();

        sched.yield_current();
        assert!(ptr::eq(sched.current(), &b));
        assert_eq!(sched.stats().yields, 1);
    }

    #[test]
    fn test_helping_finished_restores_membership() {
        let a = Job::thread("a", prio(5), 10);
        let b = Job::thread("b", prio(1), 10);
        let mut sched = scheduler();
        sched.insert(&a);
        sched.insert(&b);
        sched.current();
        sched.consume(3);

        a.help(&b).unwrap();
        assert!(ptr::eq(sched.current().helping_sink(), &b));
        sched.consume(2);
        sched.remove(&a);

        let donation = sched.helping_finished(&a).unwrap();
        assert!(donation.queued);
        assert!(sched.contains(&a));
        assert_eq!(a.quota(), 7);
        assert_eq!(a.consumed(), 5);
        assert_eq!(a.state(), JobState::Ready);
    }

    #[test]
    fn test_zero_budget_head_does_not_hide_refilled_peer() {
        let zero = Job::thread("zero", prio(6), 0);
        let b = Job::thread("b", prio(6), 10);
        let low = Job::thread("low", prio(2), 10);
        let mut sched = scheduler();
        sched.insert(&zero);
        sched.insert(&b);
        sched.insert(&low);

        assert!(ptr::eq(sched.current(), &b));
        sched.consume(10);
        sched.help(&b, &low).unwrap();
        sched.remove(&b);
        sched.helping_finished(&b).unwrap();
        assert_eq!(b.quota(), 0);

        assert!(ptr::eq(sched.current(), &b));
        assert_eq!(b.quota(), 10);
        assert_eq!(sched.stats().idle_rounds, 0);
    }

    #[test]
    fn test_slot_helping_blocked_job_is_withdrawn() {
        let a = Job::thread("a", prio(5), 10);
        let b = Job::thread("b", prio(1), 10);
        let mut sched = scheduler();
        sched.insert(&a);
        sched.insert(&b);
        sched.help(&a, &b).unwrap();
        assert!(ptr::eq(sched.current().helping_sink(), &b));

        sched.remove(&b);
        assert!(sched.current().is_idle());
        assert!(!a.is_queued());
        assert!(a.is_helping());

        sched.helping_finished(&a).unwrap();
        assert!(ptr::eq(sched.current(), &a));
        assert!(ptr::eq(sched.head().helping_sink(), &a));
    }

    #[test]
    fn test_helper_requeued_while_helping_leaves_again() {
        let a = Job::thread("a", prio(5), 10);
        let b = Job::thread("b", prio(1), 10);
        let mut sched = scheduler();
        sched.insert(&b);

        sched.help(&a, &b).unwrap();
        sched.insert(&a);
        assert!(ptr::eq(sched.current().helping_sink(), &b));
        sched.consume(4);

        let donation = sched.helping_finished(&a).unwrap();
        assert!(!donation.queued);
        assert!(!a.is_queued());
        assert_eq!(a.state(), JobState::Blocked);
        assert_eq!(a.quota(), 10);
        assert!(ptr::eq(sched.current(), &b));
    }

    #[test]
    fn test_schedulers_on_same_cpu_do_not_share_queues() {
        let a = Job::thread("a", prio(3), 10);
        let x = Job::thread("x", prio(3), 10);
        let mut first = scheduler();
        let mut second = scheduler();
        first.insert(&a);
        second.insert(&x);

        second.remove(&a);
        assert!(a.is_queued());
        assert!(first.contains(&a));
        assert!(!second.contains(&a));
        assert_eq!(first.ready_count(), 1);
        assert_eq!(second.ready_count(), 1);
        assert!(ptr::eq(first.current(), &a));
        assert!(ptr::eq(second.current(), &x));
    }
}
