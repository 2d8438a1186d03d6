//! Retry execution with exponential backoff and jitter

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::config::RetryConfig;

/// Retry policy: exponential backoff with jitter around any fallible
/// operation.
///
/// The delay before attempt `n + 1` is
/// `min(base_delay * 2^(n-1) + jitter, max_delay)` with jitter drawn
/// uniformly from `[0, 1)` seconds. Every error retries; after
/// `max_attempts` consecutive failures the last error is returned
/// unchanged.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum attempts
    pub max_attempts: u32,
    /// Base backoff delay
    pub base_delay: Duration,
    /// Backoff ceiling
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Create from config
    #[must_use]
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay,
            max_delay: config.max_delay,
        }
    }

    /// Backoff delay after the given 1-based failed attempt
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32);
        let backoff = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exp).min(1 << 20));
        let jitter = Duration::from_secs_f64(rand::rng().random::<f64>());
        backoff.saturating_add(jitter).min(self.max_delay)
    }

    /// Execute an async operation, suspending the calling task during backoff.
    ///
    /// # Errors
    ///
    /// Returns the last error from `f` once `max_attempts` are exhausted.
    pub async fn run<F, Fut, T, E>(&self, name: &str, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match f().await {
                Ok(result) => {
                    debug!(operation = name, attempt, "Attempt succeeded");
                    return Ok(result);
                }
                Err(e) => {
                    if attempt >= self.max_attempts {
                        debug!(operation = name, attempt, "Max retry attempts reached");
                        return Err(e);
                    }
                    let delay = self.delay_for(attempt);
                    debug!(
                        operation = name,
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "Retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Execute a blocking operation, sleeping on the current thread during
    /// backoff. Semantics are identical to [`RetryPolicy::run`].
    ///
    /// # Errors
    ///
    /// Returns the last error from `f` once `max_attempts` are exhausted.
    pub fn run_blocking<F, T, E>(&self, name: &str, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: Display,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match f() {
                Ok(result) => {
                    debug!(operation = name, attempt, "Attempt succeeded");
                    return Ok(result);
                }
                Err(e) => {
                    if attempt >= self.max_attempts {
                        debug!(operation = name, attempt, "Max retry attempts reached");
                        return Err(e);
                    }
                    let delay = self.delay_for(attempt);
                    debug!(
                        operation = name,
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "Retrying after backoff"
                    );
                    std::thread::sleep(delay);
                }
            }
        }
    }
}
