//! # Domain Errors

use ll_02_contract_api::WriteError;
use shared_types::{OpKind, SubjectId};
use thiserror::Error;

/// Supervisor error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SupervisorError {
    /// Another operation of this kind is outstanding for the subject.
    #[error("Operation '{op_kind}' already active for subject {subject}")]
    AlreadyActive { subject: SubjectId, op_kind: OpKind },

    /// The write could not be submitted.
    #[error("Write submission failed: {0}")]
    Submit(#[from] WriteError),

    /// A newer operation replaced this one.
    #[error("Operation superseded by a newer one")]
    Superseded,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out waiting for confirmation")]
    TimedOut,

    #[error("Operation failed: {0}")]
    Failed(String),
}
