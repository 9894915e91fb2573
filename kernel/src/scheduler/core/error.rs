//! Scheduler Error Handling
//!
//! Typed errors for the few scheduler operations that can be refused.
//! Everything on the pick / insert / remove path is total and never returns
//! an error; the only abort conditions are the fatal invariant violations
//! raised through [`sched_assert!`](crate::sched_assert) and the
//! out-of-range processor lookup.

use core::fmt;

/// Scheduler error types with detailed context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    // ═══════════════════════════════════════════════════════════════
    // Priority Errors
    // ═══════════════════════════════════════════════════════════════

    /// Priority level outside the user range
    InvalidPriority { value: u8, min: u8, max: u8 },

    // ═══════════════════════════════════════════════════════════════
    // Processor Errors
    // ═══════════════════════════════════════════════════════════════

    /// CPU id beyond the processor pool
    CpuNotAvailable { cpu_id: usize, count: usize },

    /// Bring-up configuration rejected
    InvalidConfig { reason: &'static str },

    // ═══════════════════════════════════════════════════════════════
    // Helping Errors
    // ═══════════════════════════════════════════════════════════════

    /// The donation edge would close a cycle
    HelpingCycle { job: &'static str },

    /// The job already donates its slot to another job
    AlreadyHelping { job: &'static str },

    /// Helper and helpee are homed on different CPUs
    CrossCpuHelp { helper: &'static str, helpee: &'static str },

    /// Idle jobs neither give nor receive help
    IdleCannotHelp,

    // ═══════════════════════════════════════════════════════════════
    // Ambient Errors
    // ═══════════════════════════════════════════════════════════════

    /// A logger is already installed
    LoggerAlreadyInstalled,
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPriority { value, min, max } => {
                write!(f, "Invalid priority {} (valid: {}..={})", value, min, max)
            }
            Self::CpuNotAvailable { cpu_id, count } => {
                write!(f, "CPU {} not available ({} processors)", cpu_id, count)
            }
            Self::InvalidConfig { reason } => {
                write!(f, "Invalid scheduler configuration: {}", reason)
            }
            Self::HelpingCycle { job } => {
                write!(f, "Job '{}' would help itself through a donation cycle", job)
            }
            Self::AlreadyHelping { job } => {
                write!(f, "Job '{}' is already helping", job)
            }
            Self::CrossCpuHelp { helper, helpee } => {
                write!(f, "Job '{}' cannot help '{}' on another CPU", helper, helpee)
            }
            Self::IdleCannotHelp => write!(f, "Idle jobs take no part in helping"),
            Self::LoggerAlreadyInstalled => write!(f, "Kernel logger already installed"),
        }
    }
}

impl SchedulerError {
    /// Get recovery hint for this error
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            Self::InvalidPriority { .. } => "Use a level between Priority::MIN and Priority::MAX",
            Self::CpuNotAvailable { .. } => "Check the processor count detected at bring-up",
            Self::HelpingCycle { .. } => "Block without helping, the helpee already depends on the caller",
            Self::AlreadyHelping { .. } => "Finish the current donation first",
            Self::CrossCpuHelp { .. } => "Migrate one of the jobs with affinity() before helping",
            _ => "Check scheduler configuration",
        }
    }

    /// Is this a recoverable error?
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidConfig { .. } | Self::CpuNotAvailable { .. })
    }

    /// Get error severity (0-3)
    pub fn severity(&self) -> u8 {
        match self {
            Self::InvalidConfig { .. } => 3,
            Self::CpuNotAvailable { .. } => 3,
            Self::HelpingCycle { .. } => 1,
            Self::AlreadyHelping { .. } => 1,
            Self::CrossCpuHelp { .. } => 1,
            _ => 0,
        }
    }
}

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Macro for critical scheduler assertions
///
/// Logs the violated invariant and halts the calling core through the
/// kernel panic handler.
#[macro_export]
macro_rules! sched_assert {
    ($cond:expr, $($reason:tt)+) => {
        if !$cond {
            ::log::error!("[SCHED CRITICAL] Invariant violated: {}", format_args!($($reason)+));
            panic!("[SCHED CRITICAL] Invariant violated: {}", format_args!($($reason)+));
        }
    };
}
