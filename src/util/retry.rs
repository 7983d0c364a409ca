//! Backoff between attempts at a language model call.

use std::future::Future;
use std::time::Duration;

use crate::error::HarperError;

/// How often, and how patiently, a failing call is repeated.
///
/// Only errors for which [`HarperError::is_retryable`] holds are repeated.
/// A rate-limit response carrying a retry hint waits for that long instead
/// of the computed backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Nominal wait after the `attempt`-th failure (1-based), before jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_backoff.as_secs_f64()))
    }

    /// Run `operation` until it succeeds, fails permanently, or the attempt
    /// budget is spent. The last error is returned.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, HarperError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, HarperError>>,
    {
        let mut attempt = 1;
        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };
            if !error.is_retryable() || attempt >= self.max_attempts {
                return Err(error);
            }

            let wait = match &error {
                HarperError::RateLimited {
                    retry_after_ms: Some(ms),
                } => Duration::from_millis(*ms),
                _ => jittered(self.backoff(attempt)),
            };
            tracing::warn!(
                attempt,
                max_attempts = self.max_attempts,
                wait_ms = wait.as_millis() as u64,
                error = %error,
                "retrying model call"
            );
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }
}

/// 75% to 125% of `base`.
fn jittered(base: Duration) -> Duration {
    let bits = uuid::Uuid::new_v4().as_u128() as u64;
    let factor = 0.75 + (bits % 1_000) as f64 / 2_000.0;
    base.mul_f64(factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
            multiplier: 2.0,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(350));
    }

    #[test]
    fn jitter_stays_in_band() {
        for _ in 0..50 {
            let wait = jittered(Duration::from_millis(1_000));
            assert!(wait >= Duration::from_millis(750) && wait <= Duration::from_millis(1_250));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::with_max_attempts(3);
        let value = policy
            .execute(|| async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(HarperError::Timeout(1))
                } else {
                    Ok(7)
                }
            })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_the_budget() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::with_max_attempts(2);
        let result: Result<(), _> = policy
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(HarperError::RateLimited {
                    retry_after_ms: Some(10),
                })
            })
            .await;
        assert!(matches!(result, Err(HarperError::RateLimited { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::with_max_attempts(5);
        let result: Result<(), _> = policy
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(HarperError::api(400, "bad"))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
