//! Migrator error types

use std::time::Duration;
use thiserror::Error;

use shared::{SharedError, VariantId};

/// Result type for migrator operations
pub type MigrationResult<T> = Result<T, MigrationError>;

/// Failure classes a run distinguishes when deciding what to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 429 from either store; back off and keep going
    TransientRateLimit,
    /// 4xx other than 429; the order is rejected for good
    ValidationRejected,
    /// 5xx from the remote store
    ServerError,
    /// Order references a variant with no destination counterpart
    MissingVariantMapping,
    /// Connection, TLS or body read failure
    TransportFailure,
    /// A page fetch failed during a collection walk
    CatalogWalkFailure,
    /// Local failure: ledger, configuration, serialization
    Internal,
}

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Remote API returned HTTP {status}: {body}")]
    Api {
        status: u16,
        body: serde_json::Value,
        retry_after: Option<Duration>,
    },

    #[error("Transport failure: {message}")]
    Transport { message: String },

    #[error("No destination variant for source variant {} (order {order_id}, line item {line_item})", display_variant(.variant_id))]
    MissingVariantMapping {
        order_id: String,
        line_item: usize,
        variant_id: Option<VariantId>,
    },

    #[error("Walk of {resource} failed on page {page}: {source}")]
    CatalogWalk {
        resource: String,
        page: usize,
        #[source]
        source: Box<MigrationError>,
    },

    #[error("Malformed {kind} record: {message}")]
    MalformedRecord { kind: String, message: String },

    #[error("Ledger write failed: {message}")]
    Ledger { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Job {job} did not finish: {message}")]
    Job { job: String, message: String },

    #[error("Shared component error: {0}")]
    Shared(#[from] SharedError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn display_variant(variant_id: &Option<VariantId>) -> String {
    variant_id.map(|id| id.to_string()).unwrap_or_else(|| "<none>".to_string())
}

impl MigrationError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into() }
    }

    pub fn ledger(message: impl Into<String>) -> Self {
        Self::Ledger { message: message.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn job(job: impl ToString, message: impl Into<String>) -> Self {
        Self::Job {
            job: job.to_string(),
            message: message.into(),
        }
    }

    pub fn malformed(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedRecord {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Map this error onto the run's failure taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            MigrationError::Api { status: 429, .. } => ErrorKind::TransientRateLimit,
            MigrationError::Api { status, .. } if (400..500).contains(status) => ErrorKind::ValidationRejected,
            MigrationError::Api { .. } => ErrorKind::ServerError,
            MigrationError::Transport { .. } => ErrorKind::TransportFailure,
            MigrationError::MissingVariantMapping { .. } => ErrorKind::MissingVariantMapping,
            MigrationError::CatalogWalk { .. } => ErrorKind::CatalogWalkFailure,
            MigrationError::MalformedRecord { .. }
            | MigrationError::Ledger { .. }
            | MigrationError::Config { .. }
            | MigrationError::Job { .. }
            | MigrationError::Shared(_)
            | MigrationError::Json(_)
            | MigrationError::Io(_) => ErrorKind::Internal,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.kind() == ErrorKind::TransientRateLimit
    }

    /// Whether repeating the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::TransientRateLimit | ErrorKind::ServerError | ErrorKind::TransportFailure
        )
    }

    /// Server-advertised wait, only present on rate-limit rejections
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            MigrationError::Api { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Structured detail written into a failed ledger row
    pub fn ledger_detail(&self) -> serde_json::Value {
        match self {
            MigrationError::Api { status, body, .. } => serde_json::json!({
                "kind": format!("{:?}", self.kind()),
                "status": status,
                "errors": body,
            }),
            MigrationError::MissingVariantMapping {
                line_item, variant_id, ..
            } => serde_json::json!({
                "kind": format!("{:?}", self.kind()),
                "line_item": line_item,
                "variant_id": variant_id,
            }),
            other => serde_json::json!({
                "kind": format!("{:?}", other.kind()),
                "message": other.to_string(),
            }),
        }
    }
}
