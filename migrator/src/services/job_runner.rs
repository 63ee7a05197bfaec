//! In-process job runner
//!
//! Runs migration jobs on the tokio runtime with a bounded number of
//! concurrent runs. A failed run is started again from scratch until it
//! succeeds or its attempts are used up, so delivery is at least once:
//! orders created by an earlier attempt are submitted again.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use shared::RunId;

use crate::config::{MigrationConfig, RunnerConfig};
use crate::core::rate_governor::RateGovernor;
use crate::core::retry::RetryPolicy;
use crate::error::{MigrationError, MigrationResult};
use crate::orchestrator::BatchMigrationOrchestrator;
use crate::services::commerce_client::CommerceClient;
use crate::traits::{JobHandler, JobRunner, OutcomeLedger, Sleeper};
use crate::types::{JobHandle, JobId, JobReport, JobStatus, MigrationJob, RunSummary};

type HandleMap = Arc<Mutex<HashMap<JobId, JobHandle>>>;

/// Job runner backed by tokio tasks and a semaphore
pub struct LocalJobRunner<H: JobHandler> {
    handler: Arc<H>,
    config: RunnerConfig,
    sleeper: Arc<dyn Sleeper>,
    permits: Arc<Semaphore>,
    handles: HandleMap,
    tasks: Mutex<HashMap<JobId, JoinHandle<JobReport>>>,
}

impl<H: JobHandler> LocalJobRunner<H> {
    pub fn new(handler: H, config: RunnerConfig, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            handler: Arc::new(handler),
            permits: Arc::new(Semaphore::new(config.concurrency.max(1))),
            config,
            sleeper,
            handles: Arc::new(Mutex::new(HashMap::new())),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Current view of a job that has not been joined yet
    pub async fn status(&self, job_id: JobId) -> Option<JobHandle> {
        self.handles.lock().await.get(&job_id).cloned()
    }

    /// Wait for a job to stop and return its final report
    ///
    /// The runner forgets the job once it is joined.
    pub async fn join(&self, job_id: JobId) -> MigrationResult<JobReport> {
        let task = self
            .tasks
            .lock()
            .await
            .remove(&job_id)
            .ok_or_else(|| MigrationError::job(job_id, "unknown or already joined"))?;

        let report = task.await;
        self.handles.lock().await.remove(&job_id);
        report.map_err(|e| MigrationError::job(job_id, e.to_string()))
    }

    async fn set_status(handles: &HandleMap, job_id: JobId, status: JobStatus, attempt: u32) {
        if let Some(handle) = handles.lock().await.get_mut(&job_id) {
            handle.status = status;
            handle.attempt = attempt;
        }
    }
}

#[async_trait]
impl<H: JobHandler> JobRunner for LocalJobRunner<H> {
    async fn submit(&self, job: MigrationJob) -> MigrationResult<JobHandle> {
        let job_id = job.job_id;
        let handle = JobHandle {
            job_id,
            status: JobStatus::Queued,
            attempt: 0,
            submitted_at: Utc::now(),
        };
        self.handles.lock().await.insert(job_id, handle.clone());

        let handler = self.handler.clone();
        let handles = self.handles.clone();
        let permits = self.permits.clone();
        let sleeper = self.sleeper.clone();
        let policy = RetryPolicy::fixed(self.config.max_attempts.max(1), self.config.retry_delay);

        let task = tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    Self::set_status(&handles, job_id, JobStatus::Failed, 0).await;
                    return JobReport {
                        job_id,
                        status: JobStatus::Failed,
                        attempts: 0,
                        result: Err(e.to_string()),
                    };
                }
            };

            let attempts = Arc::new(std::sync::atomic::AtomicU32::new(0));
            let result = policy
                .execute(
                    &*sleeper,
                    |e| !matches!(e, MigrationError::Config { .. }),
                    |attempt| {
                        let handler = handler.clone();
                        let handles = handles.clone();
                        let attempts = attempts.clone();
                        let job = job.clone();
                        async move {
                            attempts.store(attempt, std::sync::atomic::Ordering::SeqCst);
                            Self::set_status(&handles, job.job_id, JobStatus::Running, attempt).await;
                            info!("▶️ Job {} attempt {}", job.job_id, attempt);
                            handler.handle(&job, attempt).await
                        }
                    },
                )
                .await;

            let attempts = attempts.load(std::sync::atomic::Ordering::SeqCst);
            let status = match &result {
                Ok(summary) => {
                    info!(
                        "🏁 Job {} completed after {} attempt(s): {} ok, {} failed",
                        job_id, attempts, summary.succeeded, summary.failed
                    );
                    JobStatus::Completed
                }
                Err(e) => {
                    error!("💥 Job {} failed after {} attempt(s): {}", job_id, attempts, e);
                    JobStatus::Failed
                }
            };
            Self::set_status(&handles, job_id, status, attempts).await;

            JobReport {
                job_id,
                status,
                attempts,
                result: result.map_err(|e| e.to_string()),
            }
        });

        self.tasks.lock().await.insert(job_id, task);
        Ok(handle)
    }

    async fn list_active(&self) -> Vec<JobHandle> {
        self.handles
            .lock()
            .await
            .values()
            .filter(|handle| handle.status.is_active())
            .cloned()
            .collect()
    }
}

/// Runs one job attempt against real stores
pub struct MigrationJobHandler<L: OutcomeLedger + 'static> {
    ledger: Arc<L>,
    config: MigrationConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl<L: OutcomeLedger + 'static> MigrationJobHandler<L> {
    pub fn new(ledger: Arc<L>, config: MigrationConfig, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { ledger, config, sleeper }
    }
}

#[async_trait]
impl<L: OutcomeLedger + 'static> JobHandler for MigrationJobHandler<L> {
    async fn handle(&self, job: &MigrationJob, attempt: u32) -> MigrationResult<RunSummary> {
        let governor = RateGovernor::new(self.config.governor.clone());
        let source = CommerceClient::new(job.source.clone(), governor.clone(), self.sleeper.clone())?.with_label("source");
        let destination =
            CommerceClient::new(job.destination.clone(), governor, self.sleeper.clone())?.with_label("destination");

        let run_id = RunId::new();
        if attempt > 1 {
            warn!("🔁 Job {} restarting as run {} (attempt {})", job.job_id, run_id, attempt);
        }

        let mut orchestrator = BatchMigrationOrchestrator::new(
            run_id,
            source,
            destination,
            self.ledger.clone(),
            self.config.clone(),
            self.sleeper.clone(),
        );
        orchestrator.run().await
    }
}
