//! Outcome ledger implementations
//!
//! [`JsonlLedger`] appends one JSON object per line to a file and is the
//! durable audit trail of a run. [`InMemoryLedger`] keeps records in memory
//! for dry runs and tests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use shared::{OutcomeRecord, OutcomeStatus};

use crate::error::{MigrationError, MigrationResult};
use crate::traits::OutcomeLedger;

/// Append-only JSON Lines ledger
///
/// The file is opened in append mode for every record so that independent
/// runs can share it; each record is written with a single `write_all` of a
/// complete line.
#[derive(Debug, Clone)]
pub struct JsonlLedger {
    path: PathBuf,
}

impl JsonlLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record back in write order
    ///
    /// A missing file is an empty ledger.
    pub async fn read_all(&self) -> MigrationResult<Vec<OutcomeRecord>> {
        if !fs::try_exists(&self.path).await? {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path).await?;
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str(line).map_err(|e| {
                    MigrationError::ledger(format!("{} line {}: {}", self.path.display(), index + 1, e))
                })
            })
            .collect()
    }
}

#[async_trait]
impl OutcomeLedger for JsonlLedger {
    async fn append(&self, record: OutcomeRecord) -> MigrationResult<()> {
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| MigrationError::ledger(format!("opening {}: {}", self.path.display(), e)))?;

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| MigrationError::ledger(format!("writing {}: {}", self.path.display(), e)))?;
        file.flush()
            .await
            .map_err(|e| MigrationError::ledger(format!("flushing {}: {}", self.path.display(), e)))?;

        debug!("💾 Recorded {} as {}", record.order_id, record.status);
        Ok(())
    }
}

/// Ledger that keeps records in memory
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    records: Mutex<Vec<OutcomeRecord>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything appended so far
    pub fn records(&self) -> Vec<OutcomeRecord> {
        self.records.lock().map(|records| records.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl OutcomeLedger for InMemoryLedger {
    async fn append(&self, record: OutcomeRecord) -> MigrationResult<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| MigrationError::ledger("in-memory ledger lock poisoned"))?;
        records.push(record);
        Ok(())
    }
}

/// Totals over a set of ledger records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Orders recorded more than once (e.g. by a retried run)
    pub duplicates: usize,
    pub failed_order_ids: Vec<String>,
}

/// Summarize records in the order they were written
pub fn summarize(records: &[OutcomeRecord]) -> LedgerSummary {
    let mut summary = LedgerSummary::default();
    let mut seen = std::collections::HashSet::new();

    for record in records {
        summary.total += 1;
        if !seen.insert(record.order_id.as_str()) {
            summary.duplicates += 1;
        }
        match record.status {
            OutcomeStatus::Success => summary.succeeded += 1,
            OutcomeStatus::Failed => {
                summary.failed += 1;
                summary.failed_order_ids.push(record.order_id.clone());
            }
        }
    }

    summary
}
