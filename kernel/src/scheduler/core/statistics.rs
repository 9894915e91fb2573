//! Statistics - Scheduler activity tracking
//!
//! One instance per scheduler. Counters are relaxed atomics so they can be
//! read for diagnostics without taking the kernel lock.

use core::sync::atomic::{AtomicU64, Ordering};

/// Per-core scheduler statistics
pub struct SchedulerStats {
    /// Pick-next invocations
    pub total_picks: AtomicU64,

    /// Picks that selected another job than the previous one
    pub total_switches: AtomicU64,

    /// Picks that ended up on the idle job
    pub idle_picks: AtomicU64,

    /// Idle rounds (every ready job granted the fill quota)
    pub idle_rounds: AtomicU64,

    /// Rounds ended early (timer or voluntary yield)
    pub yields: AtomicU64,

    /// Ticks charged to selected jobs
    pub consumed_ticks: AtomicU64,
}

/// Plain copy of [`SchedulerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total_picks: u64,
    pub total_switches: u64,
    pub idle_picks: u64,
    pub idle_rounds: u64,
    pub yields: u64,
    pub consumed_ticks: u64,
}

impl SchedulerStats {
    pub const fn new() -> Self {
        Self {
            total_picks: AtomicU64::new(0),
            total_switches: AtomicU64::new(0),
            idle_picks: AtomicU64::new(0),
            idle_rounds: AtomicU64::new(0),
            yields: AtomicU64::new(0),
            consumed_ticks: AtomicU64::new(0),
        }
    }

    /// Record scheduling decision
    pub fn record_pick(&self, switched: bool, idle: bool) {
        self.total_picks.fetch_add(1, Ordering::Relaxed);
        if switched {
            self.total_switches.fetch_add(1, Ordering::Relaxed);
        }
        if idle {
            self.idle_picks.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_idle_round(&self) {
        self.idle_rounds.fetch_add(1, Ordering::Relaxed);
    }

    /// Record end of round before the quota ran out on its own
    pub fn record_yield(&self) {
        self.yields.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_consumed(&self, ticks: u32) {
        self.consumed_ticks.fetch_add(u64::from(ticks), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_picks: self.total_picks.load(Ordering::Relaxed),
            total_switches: self.total_switches.load(Ordering::Relaxed),
            idle_picks: self.idle_picks.load(Ordering::Relaxed),
            idle_rounds: self.idle_rounds.load(Ordering::Relaxed),
            yields: self.yields.load(Ordering::Relaxed),
            consumed_ticks: self.consumed_ticks.load(Ordering::Relaxed),
        }
    }

    /// Share of picks that found real work (percentage)
    pub fn utilization(&self) -> u8 {
        let picks = self.total_picks.load(Ordering::Relaxed);
        let idle = self.idle_picks.load(Ordering::Relaxed);

        if picks > 0 {
            let busy = picks.saturating_sub(idle);
            ((busy * 100) / picks) as u8
        } else {
            0
        }
    }
}

impl Default for SchedulerStats {
    fn default() -> Self {
        Self::new()
    }
}
