//! # Correlator Statistics

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for the correlator, shared by all operations it armed.
#[derive(Debug, Default)]
pub struct CorrelatorStats {
    /// Operations armed
    pub total_armed: AtomicU64,
    /// Resolved with a positive outcome
    pub total_accepted: AtomicU64,
    /// Resolved with a negative outcome
    pub total_rejected: AtomicU64,
    /// Submission failures
    pub total_failed: AtomicU64,
    pub total_timeouts: AtomicU64,
    pub total_cancelled: AtomicU64,
    /// Listener removals; equals terminal operations
    pub total_cleanups: AtomicU64,
    /// Confirmations for this subject carrying another token
    pub mismatched_events: AtomicU64,
    /// Confirmations seen before the write response
    pub early_events: AtomicU64,
}

impl CorrelatorStats {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Operations armed but not yet cleaned up.
    pub fn active(&self) -> u64 {
        self.total_armed
            .load(Ordering::Relaxed)
            .saturating_sub(self.total_cleanups.load(Ordering::Relaxed))
    }

    pub fn snapshot(&self) -> CorrelatorStatsSnapshot {
        CorrelatorStatsSnapshot {
            total_armed: self.total_armed.load(Ordering::Relaxed),
            total_accepted: self.total_accepted.load(Ordering::Relaxed),
            total_rejected: self.total_rejected.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
            total_timeouts: self.total_timeouts.load(Ordering::Relaxed),
            total_cancelled: self.total_cancelled.load(Ordering::Relaxed),
            total_cleanups: self.total_cleanups.load(Ordering::Relaxed),
            mismatched_events: self.mismatched_events.load(Ordering::Relaxed),
            early_events: self.early_events.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`CorrelatorStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrelatorStatsSnapshot {
    pub total_armed: u64,
    pub total_accepted: u64,
    pub total_rejected: u64,
    pub total_failed: u64,
    pub total_timeouts: u64,
    pub total_cancelled: u64,
    pub total_cleanups: u64,
    pub mismatched_events: u64,
    pub early_events: u64,
}
