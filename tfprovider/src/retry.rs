//! Single-retry policy for network-level failures

use std::future::Future;
use std::time::Duration;
use tfsource::Result;
use tracing::debug;

/// Retry policy applied around one provider I/O call
///
/// Only [`tfsource::ProviderError::Transient`] failures are retried. HTTP
/// status errors and decode errors are returned at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            tfconfig::engine::DEFAULT_RETRY_MAX_ATTEMPTS,
            Duration::from_millis(tfconfig::engine::DEFAULT_RETRY_BACKOFF_MS),
        )
    }
}

impl RetryPolicy {
    /// `max_attempts` is clamped to `1..=2`: never more than one retry
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.clamp(1, 2),
            backoff,
        }
    }

    /// Policy that never retries
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn from_settings(settings: &tfconfig::EngineSettings) -> Self {
        Self::new(settings.retry_max_attempts, settings.retry_backoff)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Runs `op`, issuing it again after `backoff` if it fails transiently
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    debug!(
                        call = what,
                        attempt,
                        error = %e,
                        "transient failure, retrying in {:?}",
                        self.backoff
                    );
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tfsource::ProviderError;

    #[test]
    fn test_attempts_are_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
        assert_eq!(RetryPolicy::new(5, Duration::ZERO).max_attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_retried_once() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::from_secs(1));
        let started = tokio::time::Instant::now();

        let result: Result<()> = policy
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::Transient("reset".into()))
            })
            .await;

        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_status_errors_not_retried() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::from_millis(1));

        let result: Result<()> = policy
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::from_status_code(502, "bad gateway"))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_attempt_can_succeed() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::from_millis(1));

        let result = policy
            .run("test", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ProviderError::Transient("timeout".into()))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
    }
}
