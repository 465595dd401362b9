//! Bounded retry with a fixed delay between attempts.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::RetryExhausted;

/// Retry policy for a trigger firing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including first try)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts in milliseconds
    #[serde(default = "default_backoff_delay")]
    pub backoff_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_delay() -> u64 {
    2000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_delay_ms: default_backoff_delay(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff_delay_ms: u64::try_from(backoff_delay.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn backoff_delay(&self) -> Duration {
        Duration::from_millis(self.backoff_delay_ms)
    }

    /// Check if we should retry based on attempt count (1-indexed)
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Run `op` until it succeeds or the attempts run out.
    ///
    /// `op` receives the 1-indexed attempt number. A policy with
    /// `max_attempts == 0` still runs once.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, RetryExhausted<E>>
    where
        E: std::error::Error + 'static,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if self.should_retry(attempt) => {
                    let delay = self.backoff_delay();
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = self.backoff_delay_ms,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last_error: e,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[derive(Debug, thiserror::Error)]
    #[error("attempt {0} failed")]
    struct Flaky(u32);

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy {
            max_attempts: 3,
            ..Default::default()
        };

        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn test_oversized_delay_saturates() {
        let policy = RetryPolicy::new(3, Duration::MAX);
        assert_eq!(policy.backoff_delay_ms, u64::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_failures_with_fixed_delay() {
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result = policy
            .run(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(Flaky(attempt))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two delays of 2s each
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_reports_last_error() {
        let policy = RetryPolicy::new(2, Duration::from_millis(10));

        let err = policy
            .run(|attempt| async move { Err::<(), _>(Flaky(attempt)) })
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 2);
        assert_eq!(err.last_error.to_string(), "attempt 2 failed");
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        let err = policy
            .run(|attempt| async move { Err::<(), _>(Flaky(attempt)) })
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 1);
    }
}
