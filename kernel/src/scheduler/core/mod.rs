//! Scheduler core module
//!
//! - `scheduler`: per-CPU ready queues and the pick-next decision
//! - `statistics`: per-CPU counters
//! - `error`: error type shared by the whole crate

pub mod error;
pub mod scheduler;
pub mod statistics;

pub use error::{SchedulerError, SchedulerResult};
pub use scheduler::Scheduler;
pub use statistics::{SchedulerStats, StatsSnapshot};
