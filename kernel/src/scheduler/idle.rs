//! Idle Job Implementation
//!
//! Provides the idle job that runs when no other job is ready.
//!
//! # Design
//! - One idle job per CPU, owned by that CPU's scheduler
//! - Reserved priority level 0, never queued, never removed
//! - Resuming it means waiting for the next interrupt

use crate::processor::CpuId;
use crate::scheduler::job::{CpuJob, ExecutionTrace};

/// Body of a per-CPU idle job
pub struct Idle {
    trace: ExecutionTrace,
}

impl Idle {
    pub const fn new() -> Self {
        Self {
            trace: ExecutionTrace::new(),
        }
    }

    pub fn trace(&self) -> &ExecutionTrace {
        &self.trace
    }
}

impl CpuJob for Idle {
    fn exception(&self, cpu: CpuId) {
        self.trace.record_exception(cpu);
    }

    /// The architecture layer halts the core until the next interrupt
    fn proceed(&self, cpu: CpuId) {
        log::trace!("[{}] idle", cpu);
        self.trace.record_resume(cpu);
    }
}
