//! Retry policy shared by page fetches and job attempts

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::{MigrationError, MigrationResult};
use crate::traits::Sleeper;

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

/// Bounded retries with exponential backoff
///
/// A server-advertised `Retry-After` always wins over the computed backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Add up to 25% random spread to computed delays
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Constant delay between attempts
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay,
            jitter: false,
        }
    }

    /// Backoff after failed attempt number `attempt` (1-based)
    pub fn backoff_for(&self, attempt: u32, error: &MigrationError) -> Duration {
        if let Some(retry_after) = error.retry_after() {
            return retry_after;
        }

        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);

        if self.jitter && !delay.is_zero() {
            let spread = (delay.as_millis() / 4) as u64;
            let extra = rand::thread_rng().gen_range(0..=spread);
            delay + Duration::from_millis(extra)
        } else {
            delay
        }
    }

    /// Decide whether failed attempt number `attempt` should be repeated
    pub fn decide<P>(&self, attempt: u32, error: &MigrationError, is_retryable: P) -> RetryDecision
    where
        P: Fn(&MigrationError) -> bool,
    {
        if attempt >= self.max_attempts || !is_retryable(error) {
            RetryDecision::GiveUp
        } else {
            RetryDecision::RetryAfter(self.backoff_for(attempt, error))
        }
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or
    /// attempts run out. `op` receives the 1-based attempt number.
    pub async fn execute<T, F, Fut, P>(&self, sleeper: &dyn Sleeper, is_retryable: P, mut op: F) -> MigrationResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = MigrationResult<T>>,
        P: Fn(&MigrationError) -> bool,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => match self.decide(attempt, &error, &is_retryable) {
                    RetryDecision::RetryAfter(delay) => {
                        warn!(
                            "⏳ Attempt {}/{} failed, retrying in {}ms: {}",
                            attempt,
                            self.max_attempts,
                            delay.as_millis(),
                            error
                        );
                        sleeper.sleep(delay).await;
                        attempt += 1;
                    }
                    RetryDecision::GiveUp => return Err(error),
                },
            }
        }
    }
}
