//! Job bodies
//!
//! The scheduler never runs a job itself. Once a job is selected, the
//! kernel-entry path calls one of two hooks on its body: `exception` when
//! the core trapped while running the job, `proceed` when the core returns
//! to it. The per-architecture work behind these hooks (syscall dispatch,
//! VM-exit handling, context restore) lives outside this crate; the bodies
//! here keep the bookkeeping the scheduler side can observe.

use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::processor::CpuId;
use crate::scheduler::idle::Idle;

/// Kernel-entry hooks of a schedulable job
pub trait CpuJob {
    /// `cpu` entered the kernel while running this job
    fn exception(&self, cpu: CpuId);

    /// Resume this job on `cpu`
    fn proceed(&self, cpu: CpuId);
}

/// What ran where, shared by all body kinds
pub struct ExecutionTrace {
    exceptions: AtomicU64,
    resumes: AtomicU64,
    last_cpu: AtomicUsize,
}

const NO_CPU: usize = usize::MAX;

impl ExecutionTrace {
    pub const fn new() -> Self {
        Self {
            exceptions: AtomicU64::new(0),
            resumes: AtomicU64::new(0),
            last_cpu: AtomicUsize::new(NO_CPU),
        }
    }

    pub fn record_exception(&self, cpu: CpuId) {
        self.exceptions.fetch_add(1, Ordering::Relaxed);
        self.last_cpu.store(cpu.index(), Ordering::Relaxed);
    }

    pub fn record_resume(&self, cpu: CpuId) {
        self.resumes.fetch_add(1, Ordering::Relaxed);
        self.last_cpu.store(cpu.index(), Ordering::Relaxed);
    }

    /// Kernel entries taken while this job was running
    pub fn exceptions(&self) -> u64 {
        self.exceptions.load(Ordering::Relaxed)
    }

    /// Times the job was resumed
    pub fn resumes(&self) -> u64 {
        self.resumes.load(Ordering::Relaxed)
    }

    /// Core that touched the job last
    pub fn last_cpu(&self) -> Option<CpuId> {
        match self.last_cpu.load(Ordering::Relaxed) {
            NO_CPU => None,
            cpu => Some(CpuId::new(cpu)),
        }
    }
}

impl Default for ExecutionTrace {
    fn default() -> Self {
        Self::new()
    }
}

/// User-level thread
pub struct Thread {
    trace: ExecutionTrace,
}

impl Thread {
    pub const fn new() -> Self {
        Self {
            trace: ExecutionTrace::new(),
        }
    }

    pub fn trace(&self) -> &ExecutionTrace {
        &self.trace
    }
}

impl CpuJob for Thread {
    fn exception(&self, cpu: CpuId) {
        log::trace!("[{}] thread exception", cpu);
        self.trace.record_exception(cpu);
    }

    fn proceed(&self, cpu: CpuId) {
        self.trace.record_resume(cpu);
    }
}

/// Virtual machine
pub struct Vm {
    trace: ExecutionTrace,
}

impl Vm {
    pub const fn new() -> Self {
        Self {
            trace: ExecutionTrace::new(),
        }
    }

    pub fn trace(&self) -> &ExecutionTrace {
        &self.trace
    }
}

impl CpuJob for Vm {
    fn exception(&self, cpu: CpuId) {
        log::trace!("[{}] vm exit", cpu);
        self.trace.record_exception(cpu);
    }

    fn proceed(&self, cpu: CpuId) {
        log::trace!("[{}] vm entry", cpu);
        self.trace.record_resume(cpu);
    }
}

/// Job kind, dispatched through [`CpuJob`]
pub enum JobKind {
    Thread(Thread),
    Vm(Vm),
    Idle(Idle),
}

impl JobKind {
    pub fn body(&self) -> &dyn CpuJob {
        match self {
            Self::Thread(thread) => thread,
            Self::Vm(vm) => vm,
            Self::Idle(idle) => idle,
        }
    }

    pub fn trace(&self) -> &ExecutionTrace {
        match self {
            Self::Thread(thread) => thread.trace(),
            Self::Vm(vm) => vm.trace(),
            Self::Idle(idle) => idle.trace(),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Thread(_) => "thread",
            Self::Vm(_) => "vm",
            Self::Idle(_) => "idle",
        }
    }
}
