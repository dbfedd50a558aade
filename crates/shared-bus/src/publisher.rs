//! # Event Publisher
//!
//! Defines the dispatching side of the listener registry.

use crate::subscriber::{EventCallback, EventSubscriber, Subscription};
use parking_lot::{ReentrantMutex, RwLock};
use shared_types::{EventKind, StreamEvent};
use std::cell::Cell;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, trace};

/// Trait for fanning decoded events out to listeners.
///
/// The stream connection manager is the only caller in production.
pub trait EventDispatcher: Send + Sync {
    /// Deliver `event` to every listener of its kind.
    ///
    /// # Returns
    ///
    /// The number of listeners that were invoked.
    fn dispatch(&self, event: &StreamEvent) -> usize;
}

/// One registration. `active` flips to false on removal so that a snapshot
/// taken before the removal skips it.
///
/// The flag's lock is held for the whole call. Removal takes it as well, so
/// `unsubscribe` returns only after an in-flight call on another thread has
/// finished. The lock is re-entrant so a callback can remove itself.
struct Registration {
    callback: EventCallback,
    active: ReentrantMutex<Cell<bool>>,
}

/// Multi-subscriber registry keyed by event kind.
///
/// The lock is held only to mutate or snapshot the listener lists, never
/// while a callback runs, so callbacks may subscribe and unsubscribe freely.
pub struct ListenerRegistry {
    /// Listeners per kind, in registration order.
    listeners: RwLock<HashMap<EventKind, Vec<Arc<Registration>>>>,

    /// Total events dispatched.
    events_dispatched: AtomicU64,

    /// Callbacks that panicked and were isolated.
    callback_panics: AtomicU64,
}

impl ListenerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            events_dispatched: AtomicU64::new(0),
            callback_panics: AtomicU64::new(0),
        }
    }

    /// Register `callback` for `kind`.
    ///
    /// Registering the same pair twice keeps a single registration.
    pub fn subscribe(&self, kind: EventKind, callback: EventCallback) -> Subscription {
        let mut listeners = self.listeners.write();
        let entry = listeners.entry(kind.clone()).or_default();

        if entry.iter().any(|r| r.callback == callback) {
            debug!(kind = %kind, "Listener already registered");
        } else {
            entry.push(Arc::new(Registration {
                callback: callback.clone(),
                active: ReentrantMutex::new(Cell::new(true)),
            }));
            debug!(kind = %kind, listeners = entry.len(), "Listener registered");
        }

        Subscription::new(kind, callback)
    }

    /// Remove the (kind, callback) registration.
    ///
    /// Once this returns the callback is not running on any other thread and
    /// will not be called again. Returns false if it was not registered.
    pub fn unsubscribe(&self, kind: &EventKind, callback: &EventCallback) -> bool {
        let removed = {
            let mut listeners = self.listeners.write();
            let Some(entry) = listeners.get_mut(kind) else {
                return false;
            };
            let Some(pos) = entry.iter().position(|r| &r.callback == callback) else {
                return false;
            };
            let removed = entry.remove(pos);
            let remaining = entry.len();
            if remaining == 0 {
                listeners.remove(kind);
            }
            debug!(kind = %kind, remaining, "Listener removed");
            removed
        };

        // Outside the registry lock: an in-flight call may still be running.
        removed.active.lock().set(false);
        true
    }

    /// Deliver `event` to a snapshot of the listeners for its kind.
    ///
    /// A panicking callback is logged and skipped; the rest still run.
    pub fn dispatch(&self, event: &StreamEvent) -> usize {
        self.events_dispatched.fetch_add(1, Ordering::Relaxed);

        let snapshot: Vec<Arc<Registration>> = {
            let listeners = self.listeners.read();
            match listeners.get(&event.kind) {
                Some(entry) => entry.clone(),
                None => {
                    trace!(kind = %event.kind, "No listeners for event kind");
                    return 0;
                }
            }
        };

        let mut delivered = 0;
        for registration in snapshot {
            let active = registration.active.lock();
            if !active.get() {
                continue;
            }
            let result = catch_unwind(AssertUnwindSafe(|| registration.callback.call(event)));
            drop(active);
            delivered += 1;
            if result.is_err() {
                self.callback_panics.fetch_add(1, Ordering::Relaxed);
                error!(
                    kind = %event.kind,
                    subject = ?event.subject_id,
                    "Listener panicked; isolated from remaining listeners"
                );
            }
        }

        delivered
    }

    /// Number of listeners registered for `kind`.
    #[must_use]
    pub fn listener_count(&self, kind: &EventKind) -> usize {
        self.listeners.read().get(kind).map_or(0, Vec::len)
    }

    /// Number of listeners across all kinds.
    #[must_use]
    pub fn total_listeners(&self) -> usize {
        self.listeners.read().values().map(Vec::len).sum()
    }

    /// Whether the (kind, callback) pair is registered.
    #[must_use]
    pub fn is_subscribed(&self, kind: &EventKind, callback: &EventCallback) -> bool {
        self.listeners
            .read()
            .get(kind)
            .is_some_and(|entry| entry.iter().any(|r| &r.callback == callback))
    }

    /// Total events passed to `dispatch`.
    #[must_use]
    pub fn events_dispatched(&self) -> u64 {
        self.events_dispatched.load(Ordering::Relaxed)
    }

    /// Callbacks that panicked during dispatch.
    #[must_use]
    pub fn callback_panics(&self) -> u64 {
        self.callback_panics.load(Ordering::Relaxed)
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDispatcher for ListenerRegistry {
    fn dispatch(&self, event: &StreamEvent) -> usize {
        ListenerRegistry::dispatch(self, event)
    }
}

impl EventSubscriber for ListenerRegistry {
    fn subscribe(&self, kind: EventKind, callback: EventCallback) -> Subscription {
        ListenerRegistry::subscribe(self, kind, callback)
    }

    fn unsubscribe(&self, kind: &EventKind, callback: &EventCallback) -> bool {
        ListenerRegistry::unsubscribe(self, kind, callback)
    }
}
