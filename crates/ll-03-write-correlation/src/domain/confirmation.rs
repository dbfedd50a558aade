//! # Confirmation Extraction
//!
//! Reads the correlation token and outcome out of a push event.

use crate::config::CorrelatorConfig;
use shared_types::{CorrelationToken, Outcome, StreamEvent};

/// Token and outcome carried by a confirmation event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub token: CorrelationToken,
    pub outcome: Outcome,
}

impl Confirmation {
    /// `None` when the event carries no token. A missing outcome counts as accepted.
    pub fn extract(event: &StreamEvent, config: &CorrelatorConfig) -> Option<Self> {
        let token = event
            .first_field(config.token_fields.as_slice())
            .filter(|v| !v.is_null())
            .map(CorrelationToken::from_value)?;
        let outcome = event
            .first_field(config.outcome_fields.as_slice())
            .map(Outcome::from_value)
            .unwrap_or(Outcome::Accepted);
        Some(Self { token, outcome })
    }
}
