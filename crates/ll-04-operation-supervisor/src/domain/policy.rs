//! # Supervision Policies

use serde::{Deserialize, Serialize};
use shared_types::EventKind;
use std::time::Duration;

/// What to do when an operation starts while one is outstanding for the
/// same (subject, operation kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Refuse the new operation.
    #[default]
    Reject,
    /// Cancel the outstanding operation and start the new one.
    Supersede,
}

/// Deadline for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationTimeout {
    /// The supervisor's configured default.
    #[default]
    Default,
    After(Duration),
    /// Wait until confirmed or cancelled.
    Never,
}

impl OperationTimeout {
    /// Effective deadline given the configured default.
    pub fn resolve(self, default: Option<Duration>) -> Option<Duration> {
        match self {
            OperationTimeout::Default => default,
            OperationTimeout::After(d) => Some(d),
            OperationTimeout::Never => None,
        }
    }
}

/// Per-start overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartOptions {
    pub timeout: OperationTimeout,
    /// Confirmation event kind, if not the correlator's default.
    pub confirmation_kind: Option<EventKind>,
}

impl StartOptions {
    pub fn timeout(mut self, timeout: OperationTimeout) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn confirmed_by(mut self, kind: impl Into<EventKind>) -> Self {
        self.confirmation_kind = Some(kind.into());
        self
    }
}
