//! # Operation State Machine
//!
//! ```text
//!                 TokenReceived
//! AwaitingResponse ────────────► AwaitingConfirmation
//!   │  │  │                        │     │     │
//!   │  │  └─ SubmitFailed ─► Failed│     │     │
//!   │  └──── Timeout ──► TimedOut ◄┘     │     │
//!   └─────── Cancel ───► Cancelled ◄─────┘     │
//!                                Confirmed ─► Resolved(outcome)
//! ```
//!
//! Terminal states accept nothing. All state changes go through
//! [`OperationState::apply`].

use serde::{Deserialize, Serialize};
use shared_types::{CorrelationToken, Outcome};
use std::fmt;

/// Lifecycle of one pending write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OperationState {
    /// Listener armed, write not yet acknowledged.
    AwaitingResponse,
    /// Token known, waiting for the confirmation event.
    AwaitingConfirmation,
    /// Confirmation matched. A rejection is still a resolution.
    Resolved { outcome: Outcome },
    /// The write could not be submitted.
    Failed { reason: String },
    TimedOut,
    Cancelled,
}

/// Input to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    TokenReceived(CorrelationToken),
    SubmitFailed(String),
    Confirmed(Outcome),
    Timeout,
    Cancel,
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            OperationState::AwaitingResponse | OperationState::AwaitingConfirmation
        )
    }

    /// Short name for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            OperationState::AwaitingResponse => "awaiting_response",
            OperationState::AwaitingConfirmation => "awaiting_confirmation",
            OperationState::Resolved { outcome } if outcome.is_accepted() => "accepted",
            OperationState::Resolved { .. } => "rejected",
            OperationState::Failed { .. } => "failed",
            OperationState::TimedOut => "timed_out",
            OperationState::Cancelled => "cancelled",
        }
    }

    /// Next state for `transition`, or `None` if it does not apply here.
    pub fn apply(&self, transition: &Transition) -> Option<OperationState> {
        use OperationState::*;
        use Transition::*;

        match (self, transition) {
            (AwaitingResponse, TokenReceived(_)) => Some(AwaitingConfirmation),
            (AwaitingResponse, SubmitFailed(reason)) => Some(Failed {
                reason: reason.clone(),
            }),
            (AwaitingConfirmation, Confirmed(outcome)) => Some(Resolved {
                outcome: outcome.clone(),
            }),
            (AwaitingResponse | AwaitingConfirmation, Timeout) => Some(TimedOut),
            (AwaitingResponse | AwaitingConfirmation, Cancel) => Some(Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationState::Resolved {
                outcome: Outcome::Rejected {
                    reason: Some(reason),
                },
            } => write!(f, "rejected: {reason}"),
            OperationState::Failed { reason } => write!(f, "failed: {reason}"),
            other => f.write_str(other.name()),
        }
    }
}
