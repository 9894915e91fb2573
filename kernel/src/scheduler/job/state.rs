//! State - Job scheduling state and priority levels

use core::fmt;

use crate::config::PRIORITY_LEVELS;
use crate::scheduler::SchedulerError;

/// Job state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JobState {
    /// Not a member of any ready queue
    Blocked = 0,

    /// Queued, waiting for its turn
    Ready = 1,

    /// Queued and selected by its scheduler
    Running = 2,
}

impl JobState {
    /// Check if state is schedulable
    pub fn is_schedulable(self) -> bool {
        matches!(self, Self::Ready | Self::Running)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Blocked => write!(f, "Blocked"),
            Self::Ready => write!(f, "Ready"),
            Self::Running => write!(f, "Running"),
        }
    }
}

/// Scheduling priority
///
/// A larger level is more urgent. Level 0 belongs to the idle job of each
/// core and is never queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(u8);

impl Priority {
    /// Reserved for the per-core idle job
    pub const IDLE: Self = Self(0);

    /// Least urgent level a regular job may use
    pub const MIN: Self = Self(1);

    /// Most urgent level
    pub const MAX: Self = Self((PRIORITY_LEVELS - 1) as u8);

    /// Create a user priority, rejecting the idle level and levels past
    /// [`Priority::MAX`]
    pub const fn new(level: u8) -> Result<Self, SchedulerError> {
        if level < Self::MIN.0 || level > Self::MAX.0 {
            return Err(SchedulerError::InvalidPriority {
                value: level,
                min: Self::MIN.0,
                max: Self::MAX.0,
            });
        }
        Ok(Self(level))
    }

    /// Queue index back to priority, idle level included
    pub(crate) const fn from_level(level: usize) -> Self {
        Self(level as u8)
    }

    /// Level as queue index
    pub const fn level(self) -> usize {
        self.0 as usize
    }

    pub const fn is_idle(self) -> bool {
        self.0 == Self::IDLE.0
    }

    /// Strictly more urgent than `other`
    pub const fn is_more_urgent_than(self, other: Self) -> bool {
        self.0 > other.0
    }

    /// Levels a ready queue exists for, most urgent first
    pub fn queued_levels() -> impl Iterator<Item = Self> {
        (Self::MIN.0..=Self::MAX.0).rev().map(Self)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}
