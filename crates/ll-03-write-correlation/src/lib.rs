//! # LL-03 Write-Confirmation Correlator
//!
//! Links an optimistic write to the push event that later reports what the
//! write actually did.
//!
//! **Subsystem ID:** 03
//!
//! ## Guarantees
//!
//! | Property | Mechanism |
//! |----------|-----------|
//! | Listener registered before the write is sent | `arm()` precedes `send()` |
//! | Early confirmations are not lost | buffered while `AwaitingResponse` |
//! | Mismatched tokens change nothing | only a token match drives `Confirmed` |
//! | Cleanup exactly once | terminal transition takes the subscription |
//! | Late events after cancel/timeout are no-ops | terminal states absorb all input |
//!
//! ## Module Structure
//!
//! ```text
//! ll-03-write-correlation/
//! ├── domain/          # OperationState machine, Confirmation, stats, errors
//! ├── application/     # TrackedOperation, WriteCorrelator
//! └── config.rs        # CorrelatorConfig
//! ```

#![warn(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod application;
pub mod config;
pub mod domain;

pub use application::{OperationUpdate, TrackedOperation, TransitionHook, WriteCorrelator};
pub use config::{CorrelatorConfig, CorrelatorConfigError};
pub use domain::{
    Confirmation, CorrelationError, CorrelatorStatsSnapshot, OperationState, Transition,
};
