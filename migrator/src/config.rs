//! Runtime configuration for migration runs

use std::time::Duration;

use crate::core::retry::RetryPolicy;
use crate::error::{MigrationError, MigrationResult};

/// Largest page size the remote collection endpoints accept
pub const MAX_PAGE_SIZE: u32 = 250;

/// What a collection walk does when a page cannot be fetched after retries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFailurePolicy {
    /// Surface the failure as `CatalogWalk` and abort the caller
    Propagate,
    /// Log the failure and treat it as the end of the collection
    Truncate,
}

impl std::str::FromStr for PageFailurePolicy {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "propagate" => Ok(PageFailurePolicy::Propagate),
            "truncate" => Ok(PageFailurePolicy::Truncate),
            _ => Err(MigrationError::config(format!("Unknown page failure policy: {s}"))),
        }
    }
}

/// Thresholds and pacing used by the rate governor
#[derive(Debug, Clone, PartialEq)]
pub struct GovernorConfig {
    /// Throttle fraction for ordinary request budgets
    pub small_ceiling_fraction: f64,
    /// Throttle fraction once the budget reaches `large_ceiling`
    pub large_ceiling_fraction: f64,
    /// Budget size from which the large-ceiling fraction applies
    pub large_ceiling: u32,
    /// Wait inserted before the next request while throttled
    pub throttled_backoff: Duration,
    /// Wait inserted after every successful response
    pub response_pacing: Duration,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            small_ceiling_fraction: 0.5,
            large_ceiling_fraction: 0.625,
            large_ceiling: 80,
            throttled_backoff: Duration::from_secs(10),
            response_pacing: Duration::from_millis(150),
        }
    }
}

/// Settings for one migration run
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub page_size: u32,
    pub batch_size: usize,
    pub item_delay: Duration,
    pub batch_delay: Duration,
    /// Wait after a 429 that carried no `Retry-After`
    pub default_retry_after: Duration,
    /// Value of the `status` filter on the first order page
    pub order_status: String,
    pub order_page_failure: PageFailurePolicy,
    pub page_retry: RetryPolicy,
    pub governor: GovernorConfig,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            batch_size: 3,
            item_delay: Duration::from_secs(1),
            batch_delay: Duration::from_secs(60),
            default_retry_after: Duration::from_secs(60),
            order_status: "any".to_string(),
            order_page_failure: PageFailurePolicy::Truncate,
            page_retry: RetryPolicy::default(),
            governor: GovernorConfig::default(),
        }
    }
}

impl MigrationConfig {
    pub fn validate(&self) -> MigrationResult<()> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(MigrationError::config(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        if self.batch_size == 0 {
            return Err(MigrationError::config("batch_size must be at least 1"));
        }
        if self.page_retry.max_attempts == 0 {
            return Err(MigrationError::config("page_retry.max_attempts must be at least 1"));
        }
        let fractions = [self.governor.small_ceiling_fraction, self.governor.large_ceiling_fraction];
        if fractions.iter().any(|f| !(0.0..=1.0).contains(f)) {
            return Err(MigrationError::config("governor fractions must lie within 0.0..=1.0"));
        }
        Ok(())
    }
}

/// Settings for the local job runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Runs allowed to execute at the same time
    pub concurrency: usize,
    /// Attempts per job, including the first
    pub max_attempts: u32,
    /// Wait between a failed attempt and the next one
    pub retry_delay: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_attempts: 3,
            retry_delay: Duration::from_secs(30),
        }
    }
}
