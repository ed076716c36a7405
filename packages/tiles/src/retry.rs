//! Retry with exponential backoff for tile requests.
//!
//! Only errors for which [`TileDownloadError::is_transient`] holds are
//! retried; a 404 or a local write failure is returned immediately.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;

use crate::TileDownloadError;

/// How many times, and how patiently, a tile request is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first (minimum 1).
    pub max_attempts: u32,
    /// Delay before the first retry, doubled for each further retry.
    pub base_delay_ms: u64,
    /// Upper bound on any single delay.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Delay before retry number `retry` (1-based).
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(20);
        Duration::from_millis(
            self.base_delay_ms
                .saturating_mul(factor)
                .min(self.max_delay_ms),
        )
    }
}

/// Runs `operation` until it succeeds, fails permanently, or the policy's
/// attempts run out. `label` identifies the request in log lines.
///
/// # Errors
///
/// Returns the last [`TileDownloadError`] produced by `operation`.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    operation: F,
) -> Result<T, TileDownloadError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, TileDownloadError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = policy.delay(attempt);
                log::debug!("{label}: {e}; retry {attempt}/{} in {delay:?}", max_attempts - 1);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 2,
        }
    }

    fn status(code: u16) -> TileDownloadError {
        TileDownloadError::HttpStatus {
            url: "http://tiles.test/1".to_string(),
            status: code,
        }
    }

    #[test]
    fn delay_doubles_up_to_cap() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
        };
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(4), Duration::from_millis(800));
        assert_eq!(policy.delay(5), Duration::from_millis(1_000));
        assert_eq!(policy.delay(60), Duration::from_millis(1_000));
    }

    #[tokio::test]
    async fn retries_server_errors_until_success() {
        let calls = &AtomicU32::new(0);
        let result = with_retry(&fast_policy(4), "tile", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(status(503))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_client_errors() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(4), "tile", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(status(404))
        })
        .await;
        assert!(matches!(
            result,
            Err(TileDownloadError::HttpStatus { status: 404, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_rate_limiting_then_gives_up() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(3), "tile", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(status(429))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let calls = &AtomicU32::new(0);
        let _: Result<(), _> = with_retry(&fast_policy(0), "tile", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(status(500))
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
