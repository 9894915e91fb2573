//! Job management module

pub mod body;
pub mod job;
pub mod state;

pub use body::{CpuJob, ExecutionTrace, JobKind, Thread, Vm};
pub use job::{Donation, Job, Quota, ReadyAdapter};
pub use state::{JobState, Priority};
