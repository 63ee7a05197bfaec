//! Service implementations
//!
//! Real implementations of the traits in [`crate::traits`]: the HTTP store
//! client, outcome ledgers, the tokio sleeper, environment credentials and
//! the local job runner.

pub mod commerce_client;
pub mod credentials;
pub mod job_runner;
pub mod ledger;
pub mod sleeper;

#[cfg(test)]
mod tests;

pub use commerce_client::CommerceClient;
pub use credentials::EnvCredentialSource;
pub use job_runner::{LocalJobRunner, MigrationJobHandler};
pub use ledger::{InMemoryLedger, JsonlLedger, LedgerSummary, summarize};
pub use sleeper::TokioSleeper;
