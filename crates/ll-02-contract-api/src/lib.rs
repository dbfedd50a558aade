//! # LL-02 Contract API
//!
//! Request/response access to the ledger backend.
//!
//! **Subsystem ID:** 02
//! **Architecture:** Hexagonal (Ports/Adapters)
//!
//! A write returns only an opaque correlation token. Whether it took effect
//! is announced later on the push stream and matched by `ll-03`.
//!
//! ## Module Structure
//!
//! ```text
//! ll-02-contract-api/
//! ├── domain/          # MethodCall, ContractDescriptor, ApiError
//! ├── ports/           # WriteApi, ContractApi + MockWriteApi
//! ├── adapters/        # HttpContractApi (reqwest)
//! └── config.rs        # ApiConfig
//! ```

#![warn(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;

pub use adapters::HttpContractApi;
pub use config::{ApiConfig, ApiConfigError};
pub use domain::{
    token_from_response, ApiAction, ApiError, ContractDescriptor, HealthStatus, MethodCall,
    WriteError,
};
pub use ports::{ContractApi, MockContractApi, MockWriteApi, SubmittedWrite, WriteApi};
