//! # Supervisor Statistics

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct SupervisorStats {
    pub started: AtomicU64,
    pub rejected_duplicates: AtomicU64,
    pub superseded: AtomicU64,
    pub submit_failures: AtomicU64,
}

impl SupervisorStats {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SupervisorStatsSnapshot {
        SupervisorStatsSnapshot {
            started: self.started.load(Ordering::Relaxed),
            rejected_duplicates: self.rejected_duplicates.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            submit_failures: self.submit_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorStatsSnapshot {
    pub started: u64,
    pub rejected_duplicates: u64,
    pub superseded: u64,
    pub submit_failures: u64,
}
