use std::fmt::Display;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// How often and how long to wait between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delays after the first failures, in order
    pub base_delays: Vec<Duration>,
    /// Additional retries once `base_delays` is exhausted
    pub final_retries: usize,
    /// Delay before each final retry
    pub final_delay: Duration,
}

impl Default for RetryPolicy {
    /// 1s, 2s, 4s, then two more attempts 8s apart.
    fn default() -> Self {
        Self {
            base_delays: [1, 2, 4].map(Duration::from_secs).to_vec(),
            final_retries: 2,
            final_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// A single attempt.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            base_delays: Vec::new(),
            final_retries: 0,
            final_delay: Duration::ZERO,
        }
    }

    /// Total number of attempts, including the first.
    #[must_use]
    pub fn attempts(&self) -> usize {
        1 + self.base_delays.len() + self.final_retries
    }

    /// The wait after failed attempt number `attempt` (1-based), or `None`
    /// when no attempts remain.
    #[must_use]
    pub fn delay_after(&self, attempt: usize) -> Option<Duration> {
        if attempt >= self.attempts() {
            return None;
        }
        Some(
            self.base_delays
                .get(attempt.saturating_sub(1))
                .copied()
                .unwrap_or(self.final_delay),
        )
    }
}

/// Retry an async operation with backoff.
///
/// Returns the first success, or the error of the last attempt.
pub async fn retry_with_backoff<F, Fut, T, E>(mut operation: F, policy: &RetryPolicy) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                let Some(delay) = policy.delay_after(attempt) else {
                    return Err(e);
                };
                warn!(
                    "Request failed (attempt {attempt}/{}): {e}. Retrying after {}ms...",
                    policy.attempts(),
                    delay.as_millis()
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            base_delays: vec![Duration::from_secs(1), Duration::from_secs(2)],
            final_retries: 1,
            final_delay: Duration::from_secs(10),
        }
    }

    #[test]
    fn delays_follow_policy() {
        let policy = policy();
        assert_eq!(policy.attempts(), 4);
        assert_eq!(policy.delay_after(1), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_after(3), Some(Duration::from_secs(10)));
        assert_eq!(policy.delay_after(4), None);
        assert_eq!(RetryPolicy::none().delay_after(1), None);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_succeeds_on_first_attempt() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let result = retry_with_backoff(
            || {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), String>(())
                }
            },
            &policy(),
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_succeeds_after_failures() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let result: std::result::Result<(), String> = retry_with_backoff(
            || {
                let attempts = attempts.clone();
                async move {
                    let count = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    if count < 3 {
                        Err(String::from("fail"))
                    } else {
                        Ok(())
                    }
                }
            },
            &policy(),
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_returns_last_error() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let result: std::result::Result<(), String> = retry_with_backoff(
            || {
                let attempts = attempts.clone();
                async move {
                    let count = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    Err(format!("fail {count}"))
                }
            },
            &policy(),
        )
        .await;
        assert_eq!(result, Err("fail 4".to_string()));
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }
}
