//! # Reconnection Policy
//!
//! Bounded retry budget and the delay before each retry.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of reconnection attempts after a failure.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Default base delay between reconnection attempts.
pub const DEFAULT_RECONNECT_BASE_DELAY_MS: u64 = 1_000;

/// Default cap on a single reconnection delay.
pub const DEFAULT_RECONNECT_MAX_DELAY_MS: u64 = 30_000;

/// How the delay grows with the attempt number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// `base * attempt`
    Linear,
    /// `base * 2^(attempt - 1)`
    Exponential,
}

/// Retry budget for a lost or refused stream connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Reconnection attempts allowed after consecutive failures.
    pub max_attempts: u32,
    /// Delay unit in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound for any single delay in milliseconds.
    pub max_delay_ms: u64,
    pub strategy: BackoffStrategy,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            base_delay_ms: DEFAULT_RECONNECT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_RECONNECT_MAX_DELAY_MS,
            strategy: BackoffStrategy::Linear,
        }
    }
}

impl ReconnectPolicy {
    /// Policy that never reconnects.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    /// Short delays for tests.
    pub fn for_testing() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 10,
            max_delay_ms: 100,
            strategy: BackoffStrategy::Linear,
        }
    }

    /// Whether another attempt is allowed after `failures` consecutive failures.
    pub fn should_retry(&self, failures: u32) -> bool {
        failures <= self.max_attempts
    }

    /// Delay before reconnection attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = u64::from(attempt.max(1));
        let delay_ms = match self.strategy {
            BackoffStrategy::Linear => self.base_delay_ms.saturating_mul(attempt),
            BackoffStrategy::Exponential => {
                self.base_delay_ms.saturating_mul(1u64 << (attempt - 1).min(16))
            }
        };
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}
