//! # Supervisor Configuration

use crate::domain::DuplicatePolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Invalid supervisor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SupervisorConfigError {
    #[error("default timeout must be positive when set")]
    ZeroTimeout,
    #[error("update channel capacity must be positive")]
    ZeroCapacity,
}

/// Supervisor configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub duplicate_policy: DuplicatePolicy,

    /// Deadline applied to operations that do not set one, in milliseconds.
    /// `None` waits indefinitely.
    pub default_timeout_ms: Option<u64>,

    /// Buffered state updates per observer before the slowest one lags.
    pub update_capacity: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::Reject,
            default_timeout_ms: Some(60_000),
            update_capacity: 256,
        }
    }
}

impl SupervisorConfig {
    /// Create a config for testing (5 s default timeout).
    pub fn for_testing() -> Self {
        Self {
            default_timeout_ms: Some(5_000),
            update_capacity: 64,
            ..Self::default()
        }
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), SupervisorConfigError> {
        if self.default_timeout_ms == Some(0) {
            return Err(SupervisorConfigError::ZeroTimeout);
        }
        if self.update_capacity == 0 {
            return Err(SupervisorConfigError::ZeroCapacity);
        }
        Ok(())
    }
}
