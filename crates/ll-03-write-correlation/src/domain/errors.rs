//! # Domain Errors

use crate::domain::OperationState;
use ll_02_contract_api::WriteError;
use thiserror::Error;

/// Correlation error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrelationError {
    /// The write never reached `AwaitingConfirmation`.
    #[error("Write submission failed: {0}")]
    Submit(#[from] WriteError),

    /// The operation ended before its write response arrived.
    #[error("Operation already finished: {0}")]
    AlreadyFinished(OperationState),
}
