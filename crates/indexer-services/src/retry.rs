//! Explicit retry wrapper for remote calls.
//!
//! Parameterized by attempt cap, base delay, multiplier, and a predicate
//! over retryable errors, so the callers decide which failures are worth
//! another attempt.

use backoff::{backoff::Backoff, ExponentialBackoff};
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Retry parameters for a remote call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Factor applied to the delay after each retry
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    fn to_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.base_delay,
            multiplier: self.multiplier,
            randomization_factor: 0.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Run `operation`, retrying errors that satisfy `is_retryable` until the
/// attempt cap is reached. The last error is returned unchanged.
pub async fn with_retry<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    is_retryable: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut backoff = policy.to_backoff();
    let mut attempts = 0;

    loop {
        attempts += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempts >= policy.max_attempts || !is_retryable(&e) {
                    return Err(e);
                }
                match backoff.next_backoff() {
                    Some(delay) => {
                        warn!(
                            attempt = attempts,
                            retry_in_ms = delay.as_millis() as u64,
                            error = %e,
                            "Call failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        error!(error = %e, "Backoff exhausted");
                        return Err(e);
                    }
                }
            }
        }
    }
}
