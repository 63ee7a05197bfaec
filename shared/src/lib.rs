//! Shared types for the store-to-store order migration system
//!
//! Contains the data model that crosses component boundaries: store
//! credentials, catalog variant identities, ledger outcome records and the
//! run identifier stamped on every log line.

pub mod types;
pub mod errors;
pub mod logging;

pub use types::*;
pub use errors::*;
