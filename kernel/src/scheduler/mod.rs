//! Scheduler subsystem
//!
//! Per-CPU priority round robin with quotas. Jobs are linked into
//! intrusive ready queues, one per priority level, and may donate their
//! scheduling slot to another job (helping).

pub mod core;
pub mod idle;
pub mod job;
pub mod ready_queue;

// Re-exports
pub use self::core::{Scheduler, SchedulerError, SchedulerResult, SchedulerStats, StatsSnapshot};
pub use idle::Idle;
pub use job::{CpuJob, Donation, ExecutionTrace, Job, JobKind, JobState, Priority, Quota, Thread, Vm};
pub use ready_queue::{QueueTag, ReadyQueue};
