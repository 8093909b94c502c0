//! Timeout and retry around completion calls

use std::future::Future;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::UpstreamError;

/// Per-attempt timeout plus bounded retries with exponential backoff.
/// Only retryable upstream failures are repeated.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&LlmConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
            attempt_timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// A policy that never retries
    pub fn no_retry(attempt_timeout: Duration) -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
            attempt_timeout,
        }
    }

    /// Run `operation` until it succeeds, fails permanently or the retries
    /// are used up. Each attempt is bounded by `attempt_timeout`.
    pub async fn run<F, Fut, T>(&self, mut operation: F) -> Result<T, UpstreamError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let mut delay = self.backoff;
        let mut attempt = 0;

        loop {
            let result = match tokio::time::timeout(self.attempt_timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(UpstreamError::Timeout {
                    timeout_ms: self.attempt_timeout.as_millis() as u64,
                }),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        kind = e.kind(),
                        "Completion failed (attempt {}/{}), retrying in {:?}: {}",
                        attempt,
                        self.max_retries + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
