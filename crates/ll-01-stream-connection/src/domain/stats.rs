//! # Stream Statistics
//!
//! Lock-free counters for frames seen on the push stream.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the connection task.
#[derive(Debug, Default)]
pub struct StreamStats {
    /// Successful stream opens.
    pub connections_opened: AtomicU64,
    /// Failed opens plus streams that ended or errored.
    pub connection_failures: AtomicU64,
    /// Times the retry budget ran out.
    pub gave_up: AtomicU64,
    /// Non-blank frames received.
    pub frames_received: AtomicU64,
    /// Frames dropped because they did not decode.
    pub frames_malformed: AtomicU64,
    /// Events handed to the dispatcher.
    pub events_dispatched: AtomicU64,
}

impl StreamStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> StreamStatsSnapshot {
        StreamStatsSnapshot {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connection_failures: self.connection_failures.load(Ordering::Relaxed),
            gave_up: self.gave_up.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_malformed: self.frames_malformed.load(Ordering::Relaxed),
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`StreamStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStatsSnapshot {
    pub connections_opened: u64,
    pub connection_failures: u64,
    pub gave_up: u64,
    pub frames_received: u64,
    pub frames_malformed: u64,
    pub events_dispatched: u64,
}
