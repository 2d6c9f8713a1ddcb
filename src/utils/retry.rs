//! Retry with exponential backoff for transient transport failures.

use std::time::Duration;
use tokio::time::sleep;

use crate::sources::FetchError;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt; total attempts = `max_retries + 1`
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Spread each delay by +/- 50%
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// No retries at all
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (0-based)
    pub fn delay(&self, retry: u32) -> Duration {
        let scale = self.backoff_multiplier.powi(retry as i32);
        let seconds = (self.initial_delay.as_secs_f64() * scale).min(self.max_delay.as_secs_f64() * 2.0);
        let delay = Duration::from_secs_f64(seconds.max(0.0)).min(self.max_delay);

        if !self.jitter {
            return delay;
        }

        let half = delay.as_millis() as u64 / 2;
        let offset = fastrand::u64(0..=half * 2);
        Duration::from_millis((delay.as_millis() as u64 + offset).saturating_sub(half))
    }
}

/// A fetch that failed after every allowed attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure {
    pub error: FetchError,
    pub attempts: u32,
}

/// Execute an async operation, retrying transient failures.
///
/// Non-transient errors (see [`FetchError::is_transient`]) return after the
/// first attempt.
pub async fn with_retry<T, F, Fut>(config: RetryConfig, operation: F) -> Result<T, RetryFailure>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, FetchError>>,
{
    let mut attempts = 0;
    let mut operation = operation;

    loop {
        attempts += 1;

        match operation().await {
            Ok(result) => {
                if attempts > 1 {
                    tracing::info!(
                        "Fetch succeeded on attempt {} after {} transient failures",
                        attempts,
                        attempts - 1
                    );
                }
                return Ok(result);
            }
            Err(error) if error.is_transient() && attempts <= config.max_retries => {
                let delay = config.delay(attempts - 1);
                tracing::debug!(
                    "Transient error on attempt {}: {}, retrying in {:?}",
                    attempts,
                    error,
                    delay
                );
                sleep(delay).await;
            }
            Err(error) => {
                if error.is_transient() {
                    tracing::warn!("Fetch failed after {} attempts: {}", attempts, error);
                }
                return Err(RetryFailure { error, attempts });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[tokio::test]
    async fn test_retry_success_first_try() {
        let call_count = Rc::new(RefCell::new(0));

        let result = {
            let call_count = call_count.clone();
            with_retry(fast_config(2), move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    Ok("success")
                }
            })
        }
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(*call_count.borrow(), 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let call_count = Rc::new(RefCell::new(0));

        let result = {
            let call_count = call_count.clone();
            with_retry(fast_config(2), move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    if *call_count.borrow() < 3 {
                        Err(FetchError::Status(503))
                    } else {
                        Ok("success")
                    }
                }
            })
        }
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(*call_count.borrow(), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_with_attempt_count() {
        let call_count = Rc::new(RefCell::new(0));

        let result: Result<(), RetryFailure> = {
            let call_count = call_count.clone();
            with_retry(fast_config(2), move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    Err(FetchError::Timeout)
                }
            })
        }
        .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.error, FetchError::Timeout);
        assert_eq!(failure.attempts, 3);
        assert_eq!(*call_count.borrow(), 3);
    }

    #[tokio::test]
    async fn test_retry_returns_permanent_error() {
        let call_count = Rc::new(RefCell::new(0));

        let result: Result<(), RetryFailure> = {
            let call_count = call_count.clone();
            with_retry(fast_config(5), move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    Err(FetchError::Status(404))
                }
            })
        }
        .await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(*call_count.borrow(), 1);
    }

    #[test]
    fn test_backoff_delay() {
        let config = RetryConfig {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            backoff_multiplier: 2.0,
            jitter: false,
        };
        assert_eq!(config.delay(0), Duration::from_millis(100));
        assert_eq!(config.delay(1), Duration::from_millis(200));
        assert_eq!(config.delay(2), Duration::from_millis(300));

        let jittered = RetryConfig {
            jitter: true,
            ..config
        };
        for _ in 0..20 {
            let delay = jittered.delay(0);
            assert!(delay >= Duration::from_millis(50) && delay <= Duration::from_millis(150));
        }
    }
}
