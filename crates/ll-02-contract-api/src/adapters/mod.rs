//! # Adapters Layer

pub mod http;

pub use http::{HttpContractApi, APP_PATH};
