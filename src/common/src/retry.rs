//! Caller-side retry for transient backend failures.
//!
//! The registry never retries internally; layers that call it (the gateway,
//! clients) apply the configured policy to `BackendUnavailable` only.

use std::future::Future;

use crate::config::RetryConfig;
use crate::error::DiscoveryError;

/// Run `op` up to `config.attempts` times, sleeping `config.backoff` between
/// attempts. Only retryable errors trigger another attempt; client errors
/// propagate immediately.
pub async fn with_retry<R, F, Fut>(config: &RetryConfig, mut op: F) -> Result<R, DiscoveryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R, DiscoveryError>>,
{
    let attempts = config.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < attempts => {
                log::warn!(
                    "attempt {attempt}/{attempts} failed, retrying in {:?}: {err}",
                    config.backoff
                );
                tokio::time::sleep(config.backoff).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn policy(attempts: u32) -> RetryConfig {
        RetryConfig {
            attempts,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_retries_transient_failures_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&policy(3), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(DiscoveryError::BackendUnavailable("down".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_configured_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&policy(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(DiscoveryError::BackendUnavailable("down".to_string())) }
        })
        .await;

        assert_eq!(result.unwrap_err().kind(), "BACKEND_UNAVAILABLE");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_never_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&policy(5), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(DiscoveryError::InvalidInstance("bad".to_string())) }
        })
        .await;

        assert_eq!(result.unwrap_err().kind(), "INVALID_INSTANCE");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
