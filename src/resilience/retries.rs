//! Retry logic for idempotent operations.
//!
//! # Responsibilities
//! - Re-issue an operation while it fails with a retryable error
//! - Wait `base * factor^(attempt-1)` (capped, optionally jittered) in between
//! - Surface the last error once the attempt budget is spent
//!
//! # Design Decisions
//! - The caller decides idempotency; this module never inspects the operation
//! - Upstream rejections and malformed responses are final, never retried
//! - Each attempt is a fresh submission with its own correlation id

use std::future::Future;
use std::time::Duration;

use serde_json::Value;

use crate::config::RetryConfig;
use crate::error::BridgeResult;
use crate::observability::metrics;
use crate::resilience::backoff::{exponential_delay, with_jitter};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
    pub jitter_ratio: f64,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            backoff_factor: config.backoff_factor,
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter_ratio: config.jitter_ratio,
        }
    }

    /// Wait before the retry that follows failed attempt `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let delay = exponential_delay(
            attempt,
            self.base_delay,
            self.backoff_factor,
            Some(self.max_delay),
        );
        with_jitter(delay, self.jitter_ratio)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Wraps a send operation with bounded retries.
#[derive(Debug, Clone, Default)]
pub struct RetryingSender {
    policy: RetryPolicy,
}

impl RetryingSender {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `attempt` until it succeeds, fails with a non-retryable error, or
    /// the budget runs out.
    pub async fn send<F, Fut>(&self, method: &str, mut attempt: F) -> BridgeResult<Value>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = BridgeResult<Value>>,
    {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match attempt().await {
                Ok(value) => {
                    if attempts > 1 {
                        tracing::info!(method, attempts, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempts < self.policy.max_attempts => {
                    let delay = self.policy.delay(attempts);
                    tracing::info!(
                        method,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying operation"
                    );
                    metrics::record_retry(method);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if e.is_retryable() {
                        tracing::warn!(method, attempts, error = %e, "Retry budget exhausted");
                    }
                    return Err(e);
                }
            }
        }
    }
}
