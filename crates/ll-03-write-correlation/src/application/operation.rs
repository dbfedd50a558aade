//! # Tracked Operation
//!
//! One pending write: its state, its token and its listener registration.
//!
//! The record lock is held while the state changes and while observers are
//! notified, so every observer sees transitions in order. Listener removal
//! happens after the lock is released.

use crate::config::CorrelatorConfig;
use crate::domain::{Confirmation, CorrelationError, CorrelatorStats, OperationState, Transition};
use parking_lot::Mutex;
use shared_bus::{EventCallback, EventSubscriber, Subscription};
use shared_types::{CorrelationToken, EventKind, OpKind, OperationId, StreamEvent, SubjectId};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Snapshot of an operation after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationUpdate {
    pub id: OperationId,
    pub subject: SubjectId,
    pub op_kind: OpKind,
    pub state: OperationState,
}

/// Called after every transition, in transition order.
///
/// Runs with the operation's record lock held; it must not call back into
/// the same operation.
pub type TransitionHook = Arc<dyn Fn(&OperationUpdate) + Send + Sync>;

struct Record {
    state: OperationState,
    token: Option<CorrelationToken>,
    early: Vec<Confirmation>,
    subscription: Option<Subscription>,
}

/// A write awaiting its confirmation.
pub struct TrackedOperation {
    id: OperationId,
    subject: SubjectId,
    op_kind: OpKind,
    confirmation_kind: EventKind,
    record: Mutex<Record>,
    state_tx: watch::Sender<OperationState>,
    subscriber: Arc<dyn EventSubscriber>,
    config: Arc<CorrelatorConfig>,
    stats: Arc<CorrelatorStats>,
    hook: Option<TransitionHook>,
}

impl TrackedOperation {
    /// Create the operation and register its listener.
    pub(crate) fn arm(
        subject: SubjectId,
        op_kind: OpKind,
        confirmation_kind: EventKind,
        subscriber: Arc<dyn EventSubscriber>,
        config: Arc<CorrelatorConfig>,
        stats: Arc<CorrelatorStats>,
        hook: Option<TransitionHook>,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(OperationState::AwaitingResponse);
        let op = Arc::new(Self {
            id: OperationId::new(),
            subject,
            op_kind,
            confirmation_kind,
            record: Mutex::new(Record {
                state: OperationState::AwaitingResponse,
                token: None,
                early: Vec::new(),
                subscription: None,
            }),
            state_tx,
            subscriber,
            config,
            stats,
            hook,
        });

        let weak: Weak<Self> = Arc::downgrade(&op);
        let callback = EventCallback::new(move |event| {
            if let Some(op) = weak.upgrade() {
                op.on_event(event);
            }
        });
        let subscription = op
            .subscriber
            .subscribe(op.confirmation_kind.clone(), callback);
        op.record.lock().subscription = Some(subscription);

        CorrelatorStats::incr(&op.stats.total_armed);
        debug!(
            operation = %op.id,
            subject = %op.subject,
            op_kind = %op.op_kind,
            kind = %op.confirmation_kind,
            "Armed pending operation"
        );
        op
    }

    pub fn id(&self) -> OperationId {
        self.id
    }

    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }

    pub fn op_kind(&self) -> &OpKind {
        &self.op_kind
    }

    pub fn confirmation_kind(&self) -> &EventKind {
        &self.confirmation_kind
    }

    pub fn state(&self) -> OperationState {
        self.record.lock().state.clone()
    }

    pub fn is_terminal(&self) -> bool {
        self.record.lock().state.is_terminal()
    }

    /// Token of the write, cleared once the operation ends.
    pub fn token(&self) -> Option<CorrelationToken> {
        self.record.lock().token.clone()
    }

    /// Whether the listener is still registered.
    pub fn is_listening(&self) -> bool {
        self.record.lock().subscription.is_some()
    }

    /// Watch state changes.
    pub fn subscribe(&self) -> watch::Receiver<OperationState> {
        self.state_tx.subscribe()
    }

    /// Wait for a terminal state.
    pub async fn wait(&self) -> OperationState {
        let mut rx = self.state_tx.subscribe();
        let result = rx.wait_for(OperationState::is_terminal).await;
        match result {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    /// Record the write response. Buffered confirmations are matched right away.
    pub fn set_token(&self, token: CorrelationToken) -> Result<(), CorrelationError> {
        let (result, cleanup) = {
            let mut rec = self.record.lock();
            if self
                .step(&mut rec, &Transition::TokenReceived(token.clone()))
                .is_none()
            {
                return Err(CorrelationError::AlreadyFinished(rec.state.clone()));
            }
            rec.token = Some(token.clone());

            let early = std::mem::take(&mut rec.early);
            let mut cleanup = None;
            for confirmation in early {
                if confirmation.token == token && !rec.state.is_terminal() {
                    cleanup = self.step(&mut rec, &Transition::Confirmed(confirmation.outcome));
                } else {
                    CorrelatorStats::incr(&self.stats.mismatched_events);
                }
            }
            (Ok(()), cleanup.flatten())
        };
        self.release(cleanup);
        result
    }

    /// The write could not be submitted.
    pub fn fail_submit(&self, reason: impl Into<String>) -> bool {
        self.apply(Transition::SubmitFailed(reason.into()))
    }

    /// The caller's deadline passed.
    pub fn expire(&self) -> bool {
        self.apply(Transition::Timeout)
    }

    /// Stop waiting. A later confirmation has no effect.
    pub fn cancel(&self) -> bool {
        self.apply(Transition::Cancel)
    }

    fn apply(&self, transition: Transition) -> bool {
        let outcome = {
            let mut rec = self.record.lock();
            self.step(&mut rec, &transition)
        };
        match outcome {
            Some(cleanup) => {
                self.release(cleanup);
                true
            }
            None => false,
        }
    }

    /// Listener entry point.
    fn on_event(&self, event: &StreamEvent) {
        if !event.concerns(&self.subject) {
            return;
        }
        let Some(confirmation) = Confirmation::extract(event, &self.config) else {
            return;
        };

        let mut guard = self.record.lock();
        let rec = &mut *guard;
        let cleanup = match rec.state {
            OperationState::AwaitingResponse => {
                if rec.early.len() < self.config.max_early_events {
                    CorrelatorStats::incr(&self.stats.early_events);
                    debug!(
                        operation = %self.id,
                        token = %confirmation.token,
                        "Buffered confirmation received before write response"
                    );
                    rec.early.push(confirmation);
                } else {
                    warn!(
                        operation = %self.id,
                        limit = self.config.max_early_events,
                        "Early confirmation buffer full, dropping event"
                    );
                }
                None
            }
            OperationState::AwaitingConfirmation
                if rec.token.as_ref() == Some(&confirmation.token) =>
            {
                self.step(rec, &Transition::Confirmed(confirmation.outcome))
                    .flatten()
            }
            OperationState::AwaitingConfirmation => {
                CorrelatorStats::incr(&self.stats.mismatched_events);
                debug!(
                    operation = %self.id,
                    token = %confirmation.token,
                    "Ignoring confirmation for another write"
                );
                None
            }
            _ => None,
        };
        drop(guard);
        self.release(cleanup);
    }

    /// Apply `transition` under the record lock.
    ///
    /// Returns `None` if the transition does not apply. On a terminal state
    /// the token is cleared and the subscription handed back for removal.
    fn step(&self, rec: &mut Record, transition: &Transition) -> Option<Option<Subscription>> {
        let next = rec.state.apply(transition)?;
        rec.state = next.clone();

        let cleanup = if next.is_terminal() {
            rec.token = None;
            rec.early.clear();
            self.count_terminal(&next);
            rec.subscription.take()
        } else {
            None
        };

        debug!(
            operation = %self.id,
            subject = %self.subject,
            state = next.name(),
            "Operation transition"
        );
        self.state_tx.send_replace(next.clone());
        if let Some(hook) = &self.hook {
            hook(&OperationUpdate {
                id: self.id,
                subject: self.subject.clone(),
                op_kind: self.op_kind.clone(),
                state: next,
            });
        }
        Some(cleanup)
    }

    fn count_terminal(&self, state: &OperationState) {
        let counter = match state {
            OperationState::Resolved { outcome } if outcome.is_accepted() => {
                &self.stats.total_accepted
            }
            OperationState::Resolved { .. } => &self.stats.total_rejected,
            OperationState::Failed { .. } => &self.stats.total_failed,
            OperationState::TimedOut => &self.stats.total_timeouts,
            OperationState::Cancelled => &self.stats.total_cancelled,
            OperationState::AwaitingResponse | OperationState::AwaitingConfirmation => return,
        };
        CorrelatorStats::incr(counter);
    }

    /// Remove the listener outside the record lock.
    fn release(&self, subscription: Option<Subscription>) {
        if let Some(sub) = subscription {
            self.subscriber.unsubscribe(sub.kind(), sub.callback());
            CorrelatorStats::incr(&self.stats.total_cleanups);
        }
    }
}

impl Drop for TrackedOperation {
    fn drop(&mut self) {
        let rec = self.record.get_mut();
        if let Some(sub) = rec.subscription.take() {
            debug!(operation = %self.id, "Pending operation dropped, removing listener");
            rec.state = OperationState::Cancelled;
            rec.token = None;
            CorrelatorStats::incr(&self.stats.total_cancelled);
            self.subscriber.unsubscribe(sub.kind(), sub.callback());
            CorrelatorStats::incr(&self.stats.total_cleanups);
        }
    }
}

impl std::fmt::Debug for TrackedOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedOperation")
            .field("id", &self.id)
            .field("subject", &self.subject)
            .field("op_kind", &self.op_kind)
            .field("state", &self.state())
            .finish()
    }
}
