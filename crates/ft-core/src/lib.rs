//! # ft-core
//!
//! Core crate for the futures-account system, providing:
//!
//! - **Types** (`types`) — enums, ledger entities, order/report structs
//! - **Errors** (`error`) — domain-specific `AccountError` via thiserror
//! - **Rates** (`rates`) — `RateProvider` lookup interface
//! - **Store** (`store`) — `AccountStore` persistence-provider interface
//! - **Configuration** (`config`) — JSON config deserialization
//! - **Logging** (`logging`) — tracing-based structured logging

pub mod config;
pub mod error;
pub mod logging;
pub mod rates;
pub mod store;
pub mod types;

// Re-export types at crate root for convenience.
pub use error::{AccountError, Result};
pub use types::*;
