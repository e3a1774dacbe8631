//! Bounded retry with exponential backoff.
//!
//! Client operations that lose a row-lock race fail with `LockTimeout`.
//! [`RetryPolicy::run`] re-runs the whole transaction for those errors only;
//! every other error is returned on the first attempt.

use std::future::Future;
use std::time::Duration;

use fracshare_types::{ErrorKind, Result, RetryConfig};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_backoff: Duration::from_millis(config.base_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Run `attempt` until it succeeds, fails with a non-retryable error, or
    /// the attempt budget is spent.
    pub async fn run<T, F, Fut>(&self, op: &'static str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut tries: u32 = 0;
        loop {
            tries += 1;
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && tries < self.max_attempts => {
                    let backoff = self.backoff(tries - 1);
                    tracing::debug!(
                        op,
                        attempt = tries,
                        backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Retrying after contention"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    match e.kind() {
                        ErrorKind::Integrity | ErrorKind::Internal => {
                            tracing::error!(op, attempt = tries, error = %e, "Operation failed");
                        }
                        ErrorKind::Concurrency => {
                            tracing::warn!(op, attempt = tries, error = %e, "Retries exhausted");
                        }
                        _ => tracing::debug!(op, error = %e, "Operation rejected"),
                    }
                    return Err(e);
                }
            }
        }
    }

    /// `base × 2^retry`, capped at the maximum.
    fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_backoff
            .checked_mul(factor)
            .map_or(self.max_backoff, |d| d.min(self.max_backoff))
    }
}
