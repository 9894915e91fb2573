//! Build-time and bring-up configuration
//!
//! The constants are fixed when the kernel is built (number of priority
//! levels, number of cores, default time slices). [`SchedulerConfig`] carries
//! the few values chosen at bring-up and is validated once, when the
//! processor pool is constructed.

use crate::scheduler::SchedulerError;

/// Number of priority levels, including the idle level 0
pub const PRIORITY_LEVELS: usize = 8;

/// Number of physical cores the kernel is built for
pub const PROCESSORS: usize = 4;

/// Per-round allotment of a job that does not ask for a specific one (ticks)
pub const DEFAULT_QUOTA: u32 = 10;

/// Quota every ready job receives in an idle round (ticks)
pub const DEFAULT_FILL_QUOTA: u32 = 1;

/// Core that performs the single-threaded part of bring-up
pub const DEFAULT_PRIMARY_CPU: usize = 0;

/// Scheduler configuration chosen at bring-up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Quota granted to every ready job when no job has quota left
    pub fill_quota: u32,

    /// Core that boots first and releases the others
    pub primary_cpu: usize,
}

impl SchedulerConfig {
    pub const fn new() -> Self {
        Self {
            fill_quota: DEFAULT_FILL_QUOTA,
            primary_cpu: DEFAULT_PRIMARY_CPU,
        }
    }

    pub const fn with_fill_quota(mut self, ticks: u32) -> Self {
        self.fill_quota = ticks;
        self
    }

    pub const fn with_primary_cpu(mut self, cpu: usize) -> Self {
        self.primary_cpu = cpu;
        self
    }

    /// Check the configuration against the number of cores of the pool
    pub fn validate(&self, processors: usize) -> Result<(), SchedulerError> {
        if processors == 0 {
            return Err(SchedulerError::InvalidConfig {
                reason: "processor pool without processors",
            });
        }
        if self.primary_cpu >= processors {
            return Err(SchedulerError::CpuNotAvailable {
                cpu_id: self.primary_cpu,
                count: processors,
            });
        }
        // An idle round with a zero fill would leave every ready job without
        // quota and the pick would have nothing to select.
        if self.fill_quota == 0 {
            return Err(SchedulerError::InvalidConfig {
                reason: "fill quota must be at least one tick",
            });
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new()
    }
}

// Compile-time sanity of the build constants
const _: () = assert!(PRIORITY_LEVELS >= 2 && PRIORITY_LEVELS <= u8::MAX as usize);
const _: () = assert!(PROCESSORS >= 1);
const _: () = assert!(DEFAULT_PRIMARY_CPU < PROCESSORS);
const _: () = assert!(DEFAULT_FILL_QUOTA > 0);

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::const_assert;

    const_assert!(DEFAULT_QUOTA > 0);
    const_assert!(PRIORITY_LEVELS > 1);

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(SchedulerConfig::default().validate(PROCESSORS), Ok(()));
    }

    #[test]
    fn test_primary_out_of_range() {
        let config = SchedulerConfig::new().with_primary_cpu(2);
        assert_eq!(
            config.validate(2),
            Err(SchedulerError::CpuNotAvailable { cpu_id: 2, count: 2 })
        );
    }

    #[test]
    fn test_zero_fill_rejected() {
        let config = SchedulerConfig::new().with_fill_quota(0);
        assert!(matches!(
            config.validate(1),
            Err(SchedulerError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_empty_pool_rejected() {
        assert!(SchedulerConfig::new().validate(0).is_err());
    }
}
