//! Reusable retry wrapper for fallible async operations
//!
//! The policy knows nothing about what it wraps; it is used for fetch calls
//! today and fits any other transient network dependency.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Bounded retries with linear backoff (`base_delay * attempt_number`).
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Retries after the first failure. 0 means no retry: the first error
    /// is surfaced immediately (the documented default).
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Run `op`, retrying on failure until the attempt budget is exhausted,
    /// then surface the last error. Every retry is logged with the attempt
    /// number and error message.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> std::result::Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if attempt >= self.max_attempts {
                        return Err(error);
                    }
                    attempt += 1;
                    warn!(
                        "🔁 Retry {}/{} for {}: {}",
                        attempt, self.max_attempts, label, error
                    );
                    tokio::time::sleep(self.backoff(attempt)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn zero_attempts_fails_on_first_error() {
        let policy = RetryPolicy::new(0, Duration::from_millis(1));
        let calls = Arc::new(AtomicU32::new(0));
        let calls_op = calls.clone();

        let result: Result<(), String> = policy
            .run("op", move || {
                let calls = calls_op.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("boom".to_string())
                }
            })
            .await;

        assert_eq!(result.unwrap_err(), "boom");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn succeeds_on_third_attempt_with_two_retries() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1));
        let calls = Arc::new(AtomicU32::new(0));
        let calls_op = calls.clone();

        let result: Result<u32, String> = policy
            .run("op", move || {
                let calls = calls_op.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(format!("transient {n}"))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn surfaces_last_error_after_exhaustion() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1));
        let calls = Arc::new(AtomicU32::new(0));
        let calls_op = calls.clone();

        let result: Result<(), String> = policy
            .run("op", move || {
                let calls = calls_op.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    Err(format!("error {n}"))
                }
            })
            .await;

        // Initial attempt plus two retries, last error wins
        assert_eq!(result.unwrap_err(), "error 2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn backoff_is_linear_in_attempt_number() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(300));
    }
}
