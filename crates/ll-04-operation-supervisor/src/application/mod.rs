//! # Application Layer

pub mod handle;
pub mod service;

pub use handle::{OperationHandle, ScopedOperation};
pub use service::OperationSupervisor;
