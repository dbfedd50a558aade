//! # Domain Layer
//!
//! Reconnection policy, counters and errors.

pub mod backoff;
pub mod errors;
pub mod stats;

pub use backoff::{
    BackoffStrategy, ReconnectPolicy, DEFAULT_MAX_RECONNECT_ATTEMPTS,
    DEFAULT_RECONNECT_BASE_DELAY_MS, DEFAULT_RECONNECT_MAX_DELAY_MS,
};
pub use errors::StreamConnectionError;
pub use stats::{StreamStats, StreamStatsSnapshot};
