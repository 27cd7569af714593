//! Retry with exponential backoff and full jitter for model calls.
//!
//! `max_attempts` counts every call including the first one, so a value of
//! `1` disables retrying.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts, including the initial one.
    pub max_attempts: usize,
    /// Delay cap after the first failure, doubled after each further one.
    pub base_delay_ms: u64,
    /// Upper bound on any single delay.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A config that never retries.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default().with_max_attempts(1)
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Upper bound of the wait after `failures` failed attempts.
    fn delay_cap_ms(&self, failures: u32) -> u64 {
        let exponent = failures.saturating_sub(1);
        self.base_delay_ms
            .saturating_mul(2u64.saturating_pow(exponent))
            .min(self.max_delay_ms)
    }

    /// Random wait in `0..=cap`.
    fn backoff(&self, failures: u32) -> Duration {
        let cap = self.delay_cap_ms(failures);
        if cap == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=cap))
    }
}

/// Executes an operation, retrying failures for which `is_retryable` holds.
pub(crate) async fn with_retry<T, E, F, Fut, P>(
    config: &RetryConfig,
    key: &str,
    is_retryable: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let attempts = config.max_attempts.max(1);
    let mut failures: u32 = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !is_retryable(&e) => return Err(e),
            Err(e) => {
                failures = failures.saturating_add(1);
                if failures as usize >= attempts {
                    warn!(key = %key, attempts = failures, error = %e, "Retries exhausted");
                    return Err(e);
                }
                let delay = config.backoff(failures);
                debug!(
                    key = %key,
                    attempt = failures,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "Retrying after error"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast(attempts: usize) -> RetryConfig {
        RetryConfig::new().with_max_attempts(attempts).with_base_delay_ms(1)
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay_ms, 1000);
        assert_eq!(config.max_delay_ms, 30000);
        assert_eq!(RetryConfig::disabled().max_attempts, 1);
    }

    #[test]
    fn test_delay_cap_doubles_up_to_max() {
        let config = RetryConfig::new().with_base_delay_ms(100).with_max_delay_ms(350);

        assert_eq!(config.delay_cap_ms(1), 100);
        assert_eq!(config.delay_cap_ms(2), 200);
        assert_eq!(config.delay_cap_ms(3), 350);
        assert_eq!(config.delay_cap_ms(64), 350);
    }

    #[test]
    fn test_backoff_within_cap() {
        let config = RetryConfig::new().with_base_delay_ms(100);
        for _ in 0..20 {
            assert!(config.backoff(2) <= Duration::from_millis(200));
        }
        assert_eq!(RetryConfig::new().with_base_delay_ms(0).backoff(3), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_with_retry_success_after_failures() {
        let mut calls = 0;
        let result: Result<i32, String> = with_retry(&fast(5), "test", |_| true, || {
            calls += 1;
            let current = calls;
            async move {
                if current < 3 {
                    Err(format!("attempt {current}"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_with_retry_total_attempts_equal_max() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let result: Result<i32, String> = with_retry(&fast(3), "test", |_| true, || {
            let c = counter.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err("always fails".to_string())
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_skips_permanent_errors() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let result: Result<i32, String> =
            with_retry(&fast(5), "test", |e: &String| e != "bad request", || {
                let c = counter.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err("bad request".to_string())
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_calls_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let _: Result<(), String> = with_retry(&fast(0), "test", |_| true, || {
            let c = counter.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err("down".to_string())
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
