//! Bounded exponential backoff for transient storage and persistence
//! failures.

use crate::generation::ports::{AssetStoreError, AssetStoreResult};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry schedule applied to asset store calls and task writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    multiplier: u32,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500), 2, Duration::from_secs(8))
    }
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` counts the first call and is at
    /// least one.
    #[must_use]
    pub const fn new(
        max_attempts: u32,
        initial_delay: Duration,
        multiplier: u32,
        max_delay: Duration,
    ) -> Self {
        Self {
            max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
            initial_delay,
            multiplier,
            max_delay,
        }
    }

    /// Creates a policy that never retries.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, 1, Duration::ZERO)
    }

    /// Returns the total number of attempts.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the pause before retry number `retry` (1-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self
            .multiplier
            .saturating_pow(retry.saturating_sub(1));
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Runs `operation`, retrying transient failures until the attempt budget
    /// is spent.
    ///
    /// # Errors
    ///
    /// Returns the first permanent error, or the last transient error once
    /// every attempt failed.
    pub async fn run<T, F, Fut>(&self, operation: &str, call: F) -> AssetStoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AssetStoreResult<T>>,
    {
        self.run_while(operation, AssetStoreError::is_transient, call)
            .await
    }

    /// Runs `operation`, retrying every error `is_transient` accepts until
    /// the attempt budget is spent.
    ///
    /// # Errors
    ///
    /// Returns the first error `is_transient` rejects, or the last error once
    /// every attempt failed.
    pub async fn run_while<T, E, P, F, Fut>(
        &self,
        operation: &str,
        is_transient: P,
        mut call: F,
    ) -> Result<T, E>
    where
        E: Display,
        P: Fn(&E) -> bool,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt: u32 = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if is_transient(&err) && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(err) => return Err(err),
            }
        }
    }
}
