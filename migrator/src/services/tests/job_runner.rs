//! Tests for the local job runner

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use shared::{RunId, StoreCredential};

use super::common::RecordingSleeper;
use crate::config::RunnerConfig;
use crate::error::{MigrationError, MigrationResult};
use crate::services::job_runner::LocalJobRunner;
use crate::traits::{JobHandler, JobRunner, MockJobHandler};
use crate::types::{JobId, JobStatus, MigrationJob, RunPhase, RunSummary};

fn job() -> MigrationJob {
    MigrationJob::new(
        StoreCredential::new("https://old.example.com/admin/api/2024-07", "old-token").unwrap(),
        StoreCredential::new("https://new.example.com/admin/api/2024-07", "new-token").unwrap(),
    )
}

fn done(succeeded: usize) -> RunSummary {
    let mut summary = RunSummary::new(RunId::new());
    summary.phase = RunPhase::Done;
    summary.succeeded = succeeded;
    summary
}

fn runner_config(max_attempts: u32) -> RunnerConfig {
    RunnerConfig {
        concurrency: 2,
        max_attempts,
        retry_delay: Duration::from_secs(30),
    }
}

#[tokio::test]
async fn test_job_completes_on_first_attempt() {
    let mut handler = MockJobHandler::new();
    handler.expect_handle().times(1).returning(|_, _| Ok(done(6)));

    let sleeper = Arc::new(RecordingSleeper::default());
    let runner = LocalJobRunner::new(handler, runner_config(3), sleeper.clone());

    let handle = runner.submit(job()).await.unwrap();
    assert_eq!(handle.status, JobStatus::Queued);

    let report = runner.join(handle.job_id).await.unwrap();
    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(report.attempts, 1);
    assert_eq!(report.result.unwrap().succeeded, 6);
    assert!(runner.list_active().await.is_empty());
    assert!(sleeper.calls().is_empty());
}

#[tokio::test]
async fn test_failed_runs_are_retried_from_scratch() {
    let mut handler = MockJobHandler::new();
    handler.expect_handle().times(3).returning(|_, attempt| {
        if attempt < 3 {
            Err(MigrationError::transport("connection reset"))
        } else {
            Ok(done(1))
        }
    });

    let sleeper = Arc::new(RecordingSleeper::default());
    let runner = LocalJobRunner::new(handler, runner_config(3), sleeper.clone());

    let handle = runner.submit(job()).await.unwrap();
    let report = runner.join(handle.job_id).await.unwrap();

    assert_eq!(report.attempts, 3);
    assert!(report.result.is_ok());
    assert_eq!(sleeper.calls(), vec![Duration::from_secs(30), Duration::from_secs(30)]);
}

#[tokio::test]
async fn test_job_fails_after_attempts_run_out() {
    let mut handler = MockJobHandler::new();
    handler.expect_handle().times(2).returning(|_, _| {
        Err(MigrationError::CatalogWalk {
            resource: "products".to_string(),
            page: 1,
            source: Box::new(MigrationError::transport("timeout")),
        })
    });

    let runner = LocalJobRunner::new(handler, runner_config(2), Arc::new(RecordingSleeper::default()));
    let handle = runner.submit(job()).await.unwrap();
    let report = runner.join(handle.job_id).await.unwrap();

    assert_eq!(report.status, JobStatus::Failed);
    assert_eq!(report.attempts, 2);
    assert!(report.result.unwrap_err().contains("products"));
}

#[tokio::test]
async fn test_joined_jobs_are_forgotten() {
    let mut handler = MockJobHandler::new();
    handler.expect_handle().times(3).returning(|_, _| Ok(done(1)));

    let runner = LocalJobRunner::new(handler, runner_config(1), Arc::new(RecordingSleeper::default()));
    let mut ids = Vec::new();
    for _ in 0..3 {
        let handle = runner.submit(job()).await.unwrap();
        assert!(runner.status(handle.job_id).await.is_some());
        ids.push(handle.job_id);
    }

    for id in &ids {
        assert_eq!(runner.join(*id).await.unwrap().status, JobStatus::Completed);
        assert!(runner.status(*id).await.is_none());
    }
    assert!(runner.list_active().await.is_empty());
    assert!(matches!(runner.join(ids[0]).await, Err(MigrationError::Job { .. })));
}

#[tokio::test]
async fn test_configuration_errors_are_not_retried() {
    let mut handler = MockJobHandler::new();
    handler
        .expect_handle()
        .times(1)
        .returning(|_, _| Err(MigrationError::config("batch_size must be at least 1")));

    let runner = LocalJobRunner::new(handler, runner_config(5), Arc::new(RecordingSleeper::default()));
    let handle = runner.submit(job()).await.unwrap();
    let report = runner.join(handle.job_id).await.unwrap();

    assert_eq!(report.attempts, 1);
    assert!(report.result.is_err());
}

#[tokio::test]
async fn test_join_unknown_job() {
    let runner = LocalJobRunner::new(MockJobHandler::new(), runner_config(1), Arc::new(RecordingSleeper::default()));
    assert!(matches!(runner.join(JobId::new()).await, Err(MigrationError::Job { .. })));
}

/// Handler that tracks how many runs overlap
#[derive(Default)]
struct OverlapHandler {
    running: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl JobHandler for Arc<OverlapHandler> {
    async fn handle(&self, _job: &MigrationJob, _attempt: u32) -> MigrationResult<RunSummary> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(done(0))
    }
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let handler = Arc::new(OverlapHandler::default());
    let runner = LocalJobRunner::new(handler.clone(), runner_config(1), Arc::new(RecordingSleeper::default()));

    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(runner.submit(job()).await.unwrap().job_id);
    }
    for id in ids {
        assert!(runner.join(id).await.unwrap().result.is_ok());
    }

    assert!(handler.peak.load(Ordering::SeqCst) <= 2);
    assert!(handler.peak.load(Ordering::SeqCst) >= 1);
}
