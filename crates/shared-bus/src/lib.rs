//! # Shared Bus - Listener Registry for Push-Stream Events
//!
//! Decouples stream delivery from the code that reacts to events.
//!
//! ## Rules
//!
//! - Listeners are keyed by `EventKind`; events of kinds nobody listens for
//!   are dropped quietly.
//! - Removal is by equality of the (kind, callback) pair.
//! - `dispatch` snapshots the listener list, skips any listener removed
//!   since the snapshot, and isolates panicking listeners.
//!
//! ```text
//! ┌──────────────────┐   dispatch()   ┌──────────────────┐
//! │ Stream Connection│ ─────────────► │ ListenerRegistry │
//! │     Manager      │                │  kind → [cb...]  │
//! └──────────────────┘                └────────┬─────────┘
//!                                              │ fan-out, registration order
//!                          ┌───────────────────┼───────────────────┐
//!                          ▼                   ▼                   ▼
//!                     correlator          correlator           UI watcher
//! ```

#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use publisher::{EventDispatcher, ListenerRegistry};
pub use subscriber::{EventCallback, EventSubscriber, ScopedSubscription, Subscription};
