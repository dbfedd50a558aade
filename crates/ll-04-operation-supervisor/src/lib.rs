//! # LL-04 Pending-Operation Supervisor
//!
//! The surface the UI layer talks to: start a correlated write, cancel it,
//! and observe state changes. Listener and token details stay inside.
//!
//! **Subsystem ID:** 04
//!
//! ## Rules
//!
//! - At most one outstanding operation per (subject, operation kind).
//!   A second start is rejected, or supersedes the first under
//!   [`DuplicatePolicy::Supersede`].
//! - Operations time out after the configured default unless started with
//!   [`OperationTimeout::Never`].
//! - A handle's [`outcome`](OperationHandle::outcome) tells a rejection
//!   apart from a timeout.
//!
//! ## Module Structure
//!
//! ```text
//! ll-04-operation-supervisor/
//! ├── domain/          # Policies, stats, errors
//! ├── application/     # OperationSupervisor, OperationHandle, ScopedOperation
//! └── config.rs        # SupervisorConfig
//! ```

#![warn(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod application;
pub mod config;
pub mod domain;

pub use application::{OperationHandle, OperationSupervisor, ScopedOperation};
pub use config::{SupervisorConfig, SupervisorConfigError};
pub use domain::{
    DuplicatePolicy, OperationTimeout, StartOptions, SupervisorError, SupervisorStatsSnapshot,
};
pub use ll_03_write_correlation::{OperationState, OperationUpdate};
