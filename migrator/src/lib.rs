//! Store-to-store order migration
//!
//! Copies the order history of one commerce store into another: variants are
//! matched across catalogs by SKU, source orders are walked page by page,
//! rewritten against the destination catalog and created in small paced
//! batches. Every order that reaches submission leaves exactly one row in an
//! outcome ledger.

pub mod config;
pub mod core;
pub mod error;
pub mod orchestrator;
pub mod services;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::{GovernorConfig, MigrationConfig, PageFailurePolicy, RunnerConfig};
pub use core::{CursorPaginator, OrderTransformer, RateGovernor, RateState, RetryPolicy, VariantIdentityMapper, VariantMap};
pub use error::{ErrorKind, MigrationError, MigrationResult};
pub use orchestrator::BatchMigrationOrchestrator;
pub use traits::{CredentialSource, JobHandler, JobRunner, OutcomeLedger, Sleeper, StoreApi};
pub use types::{JobHandle, JobId, JobReport, JobStatus, MigrationJob, RunPhase, RunSummary, StorePair};
