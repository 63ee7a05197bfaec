//! Request-budget tracking derived from the store's call-limit header
//!
//! The governor is stateless: every response is turned into a fresh
//! [`RateState`] and the previous one is discarded. Clients hold the latest
//! value and hand it back to the governor when deciding how long to wait.

use std::time::Duration;

use crate::config::GovernorConfig;

/// Response header carrying `<current>/<total>` request usage
pub const CALL_LIMIT_HEADER: &str = "x-shopify-shop-api-call-limit";

/// Consumed vs. total request budget for the current window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiUsage {
    pub current: u32,
    pub total: u32,
}

impl ApiUsage {
    /// Parse `"<current>/<total>"`; anything else yields `None`
    pub fn parse(header: &str) -> Option<Self> {
        let (current, total) = header.trim().split_once('/')?;
        let current = current.trim().parse().ok()?;
        let total: u32 = total.trim().parse().ok()?;
        if total == 0 {
            return None;
        }
        Some(Self { current, total })
    }

    pub fn ratio(&self) -> f64 {
        f64::from(self.current) / f64::from(self.total)
    }
}

/// Snapshot of remote usage taken from one response
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RateState {
    pub usage: Option<ApiUsage>,
    pub throttled: bool,
}

impl RateState {
    pub fn usage_ratio(&self) -> Option<f64> {
        self.usage.map(|usage| usage.ratio())
    }

    /// True when the caller should back off before its next request
    pub fn should_delay_before(&self) -> bool {
        self.throttled
    }
}

/// Turns usage signals into pacing decisions
#[derive(Debug, Clone, Default)]
pub struct RateGovernor {
    config: GovernorConfig,
}

impl RateGovernor {
    pub fn new(config: GovernorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }

    /// Throttle threshold for a budget of `total` requests
    ///
    /// Small budgets get the stricter fraction since a burst consumes a
    /// larger share of them.
    pub fn high_water_fraction(&self, total: u32) -> f64 {
        if total >= self.config.large_ceiling {
            self.config.large_ceiling_fraction
        } else {
            self.config.small_ceiling_fraction
        }
    }

    /// Compute the state implied by the latest call-limit header
    pub fn observe(&self, header: Option<&str>) -> RateState {
        match header.and_then(ApiUsage::parse) {
            Some(usage) => RateState {
                usage: Some(usage),
                throttled: usage.ratio() > self.high_water_fraction(usage.total),
            },
            None => RateState::default(),
        }
    }

    /// Wait to apply before the next request, if any
    pub fn pre_request_delay(&self, state: &RateState) -> Option<Duration> {
        state.should_delay_before().then_some(self.config.throttled_backoff)
    }

    /// Fixed pacing applied after every successful response
    pub fn post_response_delay(&self) -> Duration {
        self.config.response_pacing
    }

    /// Pause between order batches given the destination's current state
    pub fn batch_pause(&self, state: &RateState, batch_delay: Duration) -> Duration {
        match self.pre_request_delay(state) {
            Some(backoff) => backoff.max(batch_delay),
            None => batch_delay,
        }
    }
}
