//! Migrator-specific data types

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use shared::{RunId, StoreCredential};

/// Decoded 2xx response from a store
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

impl ApiResponse {
    pub fn new(status: u16, headers: HeaderMap, body: serde_json::Value) -> Self {
        Self { status, headers, body }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

/// Source and destination credentials of one migration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePair {
    pub source: StoreCredential,
    pub destination: StoreCredential,
}

/// Phase of a migration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    BuildingMap,
    Paginating,
    Submitting,
    Pacing,
    Done,
    Failed,
}

impl RunPhase {
    /// Whether the run state machine allows moving from `self` to `next`
    pub fn can_transition_to(self, next: RunPhase) -> bool {
        use RunPhase::*;
        match (self, next) {
            (Done, _) | (Failed, _) => false,
            (_, Failed) => true,
            (BuildingMap, Paginating) => true,
            (Paginating, Submitting) | (Paginating, Done) => true,
            (Submitting, Pacing) => true,
            (Pacing, Submitting) | (Pacing, Paginating) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::BuildingMap => "building-map",
            RunPhase::Paginating => "paginating",
            RunPhase::Submitting => "submitting",
            RunPhase::Pacing => "pacing",
            RunPhase::Done => "done",
            RunPhase::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Aggregate result of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub phase: RunPhase,
    pub variants_mapped: usize,
    pub pages: usize,
    pub orders_seen: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Subset of `failed` rejected before any remote call
    pub unmapped: usize,
    /// Subset of `failed` rejected with HTTP 429
    pub rate_limited: usize,
    pub last_migrated_order: Option<String>,
}

impl RunSummary {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            phase: RunPhase::BuildingMap,
            variants_mapped: 0,
            pages: 0,
            orders_seen: 0,
            succeeded: 0,
            failed: 0,
            unmapped: 0,
            rate_limited: 0,
            last_migrated_order: None,
        }
    }

    pub fn recorded(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Identifier of a job submitted to a job runner
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payload handed to the job runner: which stores to migrate between
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationJob {
    pub job_id: JobId,
    pub source: StoreCredential,
    pub destination: StoreCredential,
}

impl MigrationJob {
    pub fn new(source: StoreCredential, destination: StoreCredential) -> Self {
        Self {
            job_id: JobId::new(),
            source,
            destination,
        }
    }

    pub fn from_pair(stores: StorePair) -> Self {
        Self::new(stores.source, stores.destination)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Running)
    }
}

/// Runner-side view of a submitted job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: JobId,
    pub status: JobStatus,
    pub attempt: u32,
    pub submitted_at: DateTime<Utc>,
}

/// Final outcome of a job after the runner stopped attempting it
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_id: JobId,
    pub status: JobStatus,
    pub attempts: u32,
    pub result: Result<RunSummary, String>,
}
