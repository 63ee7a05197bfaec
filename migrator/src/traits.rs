//! Trait definitions with mockall annotations for testing
//!
//! These are the dependency-injection seams of the pipeline: the remote
//! store, the outcome ledger, the clock used for pacing and the job runner.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use shared::OutcomeRecord;

use crate::core::rate_governor::RateState;
use crate::error::MigrationResult;
use crate::types::{ApiResponse, JobHandle, MigrationJob, RunSummary, StorePair};

/// Authenticated access to one store's Admin API
///
/// Methods take `&mut self`: each exchange replaces the client's rate state
/// with the one derived from the latest response.
#[mockall::automock]
#[async_trait]
pub trait StoreApi: Send {
    async fn get(&mut self, path: &str) -> MigrationResult<ApiResponse>;

    async fn post(&mut self, path: &str, body: &serde_json::Value) -> MigrationResult<ApiResponse>;

    async fn put(&mut self, path: &str, body: &serde_json::Value) -> MigrationResult<ApiResponse>;

    async fn delete(&mut self, path: &str) -> MigrationResult<ApiResponse>;

    /// Rate state computed from the most recent response
    fn rate_state(&self) -> RateState;

    /// Human-readable store name for logs
    fn store_label(&self) -> String;
}

/// Durable append-only record of per-order outcomes
#[mockall::automock]
#[async_trait]
pub trait OutcomeLedger: Send + Sync {
    /// Persist one record before the caller moves on
    async fn append(&self, record: OutcomeRecord) -> MigrationResult<()>;
}

#[async_trait]
impl<T: OutcomeLedger + ?Sized> OutcomeLedger for Arc<T> {
    async fn append(&self, record: OutcomeRecord) -> MigrationResult<()> {
        (**self).append(record).await
    }
}

/// Source of explicit pacing delays
#[mockall::automock]
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Where store credentials come from
#[mockall::automock]
pub trait CredentialSource: Send + Sync {
    /// Every missing setting is reported in a single error
    fn load(&self) -> MigrationResult<StorePair>;
}

/// Executes one migration run for a job attempt
#[mockall::automock]
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, job: &MigrationJob, attempt: u32) -> MigrationResult<RunSummary>;
}

/// At-least-once job execution with bounded concurrency and attempts
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn submit(&self, job: MigrationJob) -> MigrationResult<JobHandle>;

    async fn list_active(&self) -> Vec<JobHandle>;
}
