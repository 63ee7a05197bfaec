//! Core types used throughout the migration system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::{SharedError, SharedResult};

/// Default Admin API version used when none is configured
pub const DEFAULT_API_VERSION: &str = "2024-07";

/// Identifier of one migration run, stamped on every log line and ledger row
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> SharedResult<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| SharedError::InvalidIdentifier { input: s.to_string() })
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Endpoint and access token for one store
///
/// Immutable once built. The token is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCredential {
    endpoint: String,
    access_token: String,
}

impl StoreCredential {
    /// Build a credential from a full Admin API base URL
    pub fn new(endpoint: impl Into<String>, access_token: impl Into<String>) -> SharedResult<Self> {
        let endpoint = endpoint.into();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(SharedError::InvalidEndpoint { input: endpoint });
        }
        let access_token = access_token.into();
        if access_token.trim().is_empty() {
            return Err(SharedError::InvalidConfig {
                field: "access_token".to_string(),
                value: "<empty>".to_string(),
            });
        }

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            access_token,
        })
    }

    /// Build a credential for a shop domain such as `example.myshopify.com`
    pub fn for_shop(shop: &str, api_version: &str, access_token: impl Into<String>) -> SharedResult<Self> {
        let shop = shop
            .trim()
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/');
        if shop.is_empty() {
            return Err(SharedError::InvalidEndpoint { input: shop.to_string() });
        }
        Self::new(format!("https://{shop}/admin/api/{api_version}"), access_token)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Join a request path (e.g. `/orders.json?limit=5`) onto the endpoint
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.endpoint, path)
        } else {
            format!("{}/{}", self.endpoint, path)
        }
    }
}

impl fmt::Debug for StoreCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreCredential")
            .field("endpoint", &self.endpoint)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Platform-scoped catalog variant identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantId(pub u64);

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One catalog variant collected during a catalog walk
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub sku: String,
    pub id: VariantId,
}

impl Variant {
    pub fn new(sku: impl Into<String>, id: u64) -> Self {
        Self {
            sku: sku.into(),
            id: VariantId(id),
        }
    }
}

/// Outcome of one attempted order migration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failed,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::Success => write!(f, "success"),
            OutcomeStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for OutcomeStatus {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "success" => Ok(OutcomeStatus::Success),
            "failed" => Ok(OutcomeStatus::Failed),
            _ => Err(SharedError::InvalidStatus { value: s.to_string() }),
        }
    }
}

/// Append-only ledger row: one per order that reached transform-and-submit
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub order_id: String,
    pub status: OutcomeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OutcomeRecord {
    pub fn success(order_id: impl Into<String>, run_id: RunId, destination_order_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            order_id: order_id.into(),
            status: OutcomeStatus::Success,
            error: None,
            destination_order_id,
            run_id: Some(run_id),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn failed(order_id: impl Into<String>, run_id: RunId, error: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            order_id: order_id.into(),
            status: OutcomeStatus::Failed,
            error: Some(error),
            destination_order_id: None,
            run_id: Some(run_id),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}
