//! # Event Subscriber
//!
//! Defines the subscription side of the listener registry: callback handles
//! and the (kind, callback) pairs that identify a registration.

use crate::publisher::ListenerRegistry;
use shared_types::{EventKind, StreamEvent};
use std::fmt;
use std::sync::{Arc, Weak};

type CallbackFn = dyn Fn(&StreamEvent) + Send + Sync;

/// A shareable listener callback.
///
/// Equality is identity: two handles are equal only if they were cloned from
/// the same `EventCallback::new` call. Removal from the registry relies on it.
#[derive(Clone)]
pub struct EventCallback(Arc<CallbackFn>);

impl EventCallback {
    /// Wrap a closure as a callback handle.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&StreamEvent) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub(crate) fn call(&self, event: &StreamEvent) {
        (self.0)(event)
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl PartialEq for EventCallback {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.addr(), other.addr())
    }
}

impl Eq for EventCallback {}

impl fmt::Debug for EventCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventCallback({:p})", self.addr())
    }
}

/// Trait for registering listeners by event kind.
pub trait EventSubscriber: Send + Sync {
    /// Register `callback` for events of `kind`.
    fn subscribe(&self, kind: EventKind, callback: EventCallback) -> Subscription;

    /// Remove a registration. Removing an unknown pair is a no-op.
    fn unsubscribe(&self, kind: &EventKind, callback: &EventCallback) -> bool;
}

/// The (kind, callback) pair that identifies one registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    kind: EventKind,
    callback: EventCallback,
}

impl Subscription {
    pub(crate) fn new(kind: EventKind, callback: EventCallback) -> Self {
        Self { kind, callback }
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    pub fn callback(&self) -> &EventCallback {
        &self.callback
    }

    /// Tie this registration to a guard that removes it on drop.
    pub fn scoped(self, registry: &Arc<ListenerRegistry>) -> ScopedSubscription {
        ScopedSubscription {
            subscription: Some(self),
            registry: Arc::downgrade(registry),
        }
    }
}

/// Registration removed when the guard is dropped.
///
/// Holds the registry weakly so a guard outliving its session does nothing.
pub struct ScopedSubscription {
    subscription: Option<Subscription>,
    registry: Weak<ListenerRegistry>,
}

impl ScopedSubscription {
    /// Remove the registration now. Later calls and the drop are no-ops.
    pub fn release(&mut self) -> bool {
        let Some(sub) = self.subscription.take() else {
            return false;
        };
        match self.registry.upgrade() {
            Some(registry) => registry.unsubscribe(sub.kind(), sub.callback()),
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.subscription.is_some()
    }
}

impl Drop for ScopedSubscription {
    fn drop(&mut self) {
        self.release();
    }
}
