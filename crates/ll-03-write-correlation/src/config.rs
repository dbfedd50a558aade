//! # Correlator Configuration

use serde::{Deserialize, Serialize};
use shared_types::EventKind;
use thiserror::Error;

/// Invalid correlator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrelatorConfigError {
    #[error("at least one token field is required")]
    NoTokenFields,
    #[error("confirmation kind must not be empty")]
    EmptyConfirmationKind,
}

/// Correlator configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelatorConfig {
    /// Event fields holding the correlation token, in lookup order.
    pub token_fields: Vec<String>,

    /// Event fields holding the outcome, in lookup order.
    pub outcome_fields: Vec<String>,

    /// Event kind that confirms a write unless the caller names another.
    pub confirmation_kind: String,

    /// Confirmations kept per operation while its token is still unknown.
    pub max_early_events: usize,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            token_fields: vec!["correlationToken".to_string(), "request".to_string()],
            outcome_fields: vec!["outcome".to_string(), "reply".to_string()],
            confirmation_kind: EventKind::CONTRACT_WRITE.to_string(),
            max_early_events: 64,
        }
    }
}

impl CorrelatorConfig {
    /// Create a config for testing. Confirmations use the `write_committed` kind.
    pub fn for_testing() -> Self {
        Self {
            confirmation_kind: "write_committed".to_string(),
            max_early_events: 8,
            ..Self::default()
        }
    }

    pub fn confirmation_kind(&self) -> EventKind {
        EventKind::new(self.confirmation_kind.clone())
    }

    pub fn validate(&self) -> Result<(), CorrelatorConfigError> {
        if self.token_fields.is_empty() {
            return Err(CorrelatorConfigError::NoTokenFields);
        }
        if self.confirmation_kind.is_empty() {
            return Err(CorrelatorConfigError::EmptyConfirmationKind);
        }
        Ok(())
    }
}
