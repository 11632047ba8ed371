//! # Retry Mechanism
//!
//! Bounded retries with exponential backoff clamped to a maximum delay.
//!
//! Layer contract: the operation is invoked at most `max_attempts` times.
//! Operation failures and timeouts raised below this layer are retried;
//! rejections raised by a breaker or bulkhead are re-raised immediately since
//! the dependency was never reached. After the last attempt the final error is
//! re-raised unchanged.

use std::future::Future;
use std::time::{Duration, Instant};

use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::types::PolicyResult;

/// Configuration for a retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of invocations, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// A retry policy bound to one service
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    service: String,
    config: RetryConfig,
}

impl RetryPolicy {
    /// Creates a new retry policy for the given service
    pub fn new<S: Into<String>>(service: S, config: RetryConfig) -> Self {
        Self {
            service: service.into(),
            config,
        }
    }

    /// Policy configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Delay slept after the given failed attempt (1-based).
    ///
    /// Doubles from `initial_delay` and never exceeds `max_delay`, so the
    /// sequence is non-decreasing.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self
            .config
            .initial_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.config.max_delay);
        delay.min(self.config.max_delay)
    }

    /// Executes `operation` until it succeeds or attempts run out
    pub async fn run<F, Fut, T, E>(&self, operation: F) -> PolicyResult<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = PolicyResult<T, E>>,
    {
        let start = Instant::now();
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(
                            service = %self.service,
                            attempt = %attempt,
                            duration_ms = %start.elapsed().as_millis(),
                            "Operation succeeded after retries"
                        );
                    }
                    return Ok(value);
                }
                Err(err) if err.is_rejection() => {
                    debug!(service = %self.service, attempt = %attempt, "Rejected by policy, not retrying");
                    return Err(err);
                }
                Err(err) if attempt >= max_attempts => {
                    warn!(
                        service = %self.service,
                        attempts = %attempt,
                        duration_ms = %start.elapsed().as_millis(),
                        "Giving up after retries"
                    );
                    counter!("resilience.retry.exhausted", 1, "service" => self.service.clone());
                    return Err(err);
                }
                Err(_) => {
                    let backoff = self.backoff(attempt);
                    debug!(
                        service = %self.service,
                        attempt = %attempt,
                        max_attempts = %max_attempts,
                        backoff_ms = %backoff.as_millis(),
                        "Retrying after error"
                    );
                    counter!("resilience.retry.attempts", 1, "service" => self.service.clone());
                    sleep(backoff).await;
                }
            }
        }
    }
}
