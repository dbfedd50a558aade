//! # Operation Handles
//!
//! What the UI layer holds for a started operation. Handles expose state,
//! never the listener or the correlation token.

use crate::domain::SupervisorError;
use ll_03_write_correlation::{OperationState, TrackedOperation};
use shared_types::{OpKind, OperationId, Outcome, SubjectId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Handle to one supervised operation.
#[derive(Clone)]
pub struct OperationHandle {
    op: Arc<TrackedOperation>,
    superseded: Arc<AtomicBool>,
}

impl OperationHandle {
    pub(crate) fn new(op: Arc<TrackedOperation>, superseded: Arc<AtomicBool>) -> Self {
        Self { op, superseded }
    }

    pub(crate) fn operation(&self) -> &Arc<TrackedOperation> {
        &self.op
    }

    pub fn id(&self) -> OperationId {
        self.op.id()
    }

    pub fn subject(&self) -> &SubjectId {
        self.op.subject()
    }

    pub fn op_kind(&self) -> &OpKind {
        self.op.op_kind()
    }

    pub fn state(&self) -> OperationState {
        self.op.state()
    }

    pub fn is_finished(&self) -> bool {
        self.op.is_terminal()
    }

    /// Whether a newer operation replaced this one.
    pub fn is_superseded(&self) -> bool {
        self.superseded.load(Ordering::Acquire)
    }

    /// Watch this operation's state.
    pub fn subscribe(&self) -> watch::Receiver<OperationState> {
        self.op.subscribe()
    }

    /// Stop waiting for the confirmation. Returns false if already finished.
    pub fn cancel(&self) -> bool {
        self.op.cancel()
    }

    /// Wait for the terminal state.
    pub async fn wait(&self) -> OperationState {
        self.op.wait().await
    }

    /// Wait for the confirmed outcome.
    ///
    /// A rejection is `Ok(Outcome::Rejected { .. })`; timeout, cancellation
    /// and supersession are errors.
    pub async fn outcome(&self) -> Result<Outcome, SupervisorError> {
        match self.wait().await {
            OperationState::Resolved { outcome } => Ok(outcome),
            OperationState::TimedOut => Err(SupervisorError::TimedOut),
            OperationState::Cancelled if self.is_superseded() => Err(SupervisorError::Superseded),
            OperationState::Cancelled => Err(SupervisorError::Cancelled),
            OperationState::Failed { reason } => Err(SupervisorError::Failed(reason)),
            state @ (OperationState::AwaitingResponse | OperationState::AwaitingConfirmation) => {
                Err(SupervisorError::Failed(format!("operation stopped in state {state}")))
            }
        }
    }
}

impl std::fmt::Debug for OperationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationHandle")
            .field("id", &self.id())
            .field("subject", self.subject())
            .field("op_kind", self.op_kind())
            .field("state", &self.state())
            .finish()
    }
}

/// Cancels its operation when dropped, unless detached.
///
/// Tie one to the lifetime of the view that started the operation.
#[derive(Debug)]
pub struct ScopedOperation {
    handle: Option<OperationHandle>,
}

impl ScopedOperation {
    pub fn new(handle: OperationHandle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    pub fn handle(&self) -> Option<&OperationHandle> {
        self.handle.as_ref()
    }

    /// Keep the operation running past this guard.
    pub fn detach(mut self) -> Option<OperationHandle> {
        self.handle.take()
    }
}

impl From<OperationHandle> for ScopedOperation {
    fn from(handle: OperationHandle) -> Self {
        Self::new(handle)
    }
}

impl Drop for ScopedOperation {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.cancel() {
                debug!(operation = %handle.id(), subject = %handle.subject(), "Scoped operation cancelled on drop");
            }
        }
    }
}
