use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use tracing::warn;

use crate::venue::venue_error::VenueResult;

/// Exponential backoff for transient venue failures (transport, 5xx, 429).
///
/// Authentication, schema and rejection errors are returned immediately.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Upper bound of the random delay added to every backoff.
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter_ms: default_jitter_ms(),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let base = self
            .initial_backoff_ms
            .saturating_mul(2u64.saturating_pow(attempt))
            .min(self.max_backoff_ms);

        let jitter = if self.jitter_ms > 0 {
            rand::rng().random_range(0..=self.jitter_ms)
        } else {
            0
        };

        Duration::from_millis(base + jitter)
    }

    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> VenueResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = VenueResult<T>>,
    {
        let mut attempt = 0;

        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_transient() && attempt < self.max_retries => {
                    let backoff = error
                        .retry_after()
                        .unwrap_or_else(|| self.backoff_for(attempt));

                    warn!(
                        operation,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        %error,
                        "transient venue error, backing off"
                    );

                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    2_000
}

fn default_jitter_ms() -> u64 {
    50
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::venue::venue_error::VenueError;

    fn quick() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            jitter_ms: 0,
        }
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 350,
            jitter_ms: 0,
        };

        assert_eq!(policy.backoff_for(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(350));
        assert_eq!(policy.backoff_for(10), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result = quick()
            .run("case", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(VenueError::Server {
                        endpoint: "/case".to_string(),
                        status: 503,
                    })
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.expect("third attempt succeeds"), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: VenueResult<()> = quick()
            .run("case", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(VenueError::Server {
                    endpoint: "/case".to_string(),
                    status: 502,
                })
            })
            .await;

        assert!(matches!(result, Err(VenueError::Server { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn does_not_retry_authentication_failures() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: VenueResult<()> = quick()
            .run("case", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(VenueError::Auth {
                    endpoint: "/case".to_string(),
                })
            })
            .await;

        assert!(matches!(result, Err(VenueError::Auth { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
