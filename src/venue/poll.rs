use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::venue::venue_error::{VenueError, VenueResult};

/// Bounded wait for the venue to reflect a mutation (fills, new leases, conversions).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PollPolicy {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval_ms: interval.as_millis() as u64,
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Re-runs `probe` until it yields a value, the timeout elapses or a stop is requested.
    pub async fn poll_until<T, F, Fut>(
        &self,
        what: &str,
        shutdown: &CancellationToken,
        mut probe: F,
    ) -> VenueResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = VenueResult<Option<T>>>,
    {
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            if let Some(value) = probe().await? {
                debug!(what, attempts, "condition met");
                return Ok(value);
            }

            let waited = started.elapsed();
            if waited >= self.timeout() {
                return Err(VenueError::Timeout {
                    what: what.to_string(),
                    waited,
                });
            }

            tokio::select! {
                _ = shutdown.cancelled() => {
                    return Err(VenueError::Cancelled { what: what.to_string() });
                }
                _ = tokio::time::sleep(self.interval()) => {}
            }
        }
    }
}

fn default_interval_ms() -> u64 {
    250
}

fn default_timeout_ms() -> u64 {
    15_000
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn quick() -> PollPolicy {
        PollPolicy::new(Duration::from_millis(1), Duration::from_millis(50))
    }

    #[tokio::test]
    async fn returns_once_condition_holds() {
        let counter = AtomicU32::new(0);
        let polls = &counter;

        let value = quick()
            .poll_until("position", &CancellationToken::new(), move || async move {
                let n = polls.fetch_add(1, Ordering::SeqCst);
                Ok((n >= 2).then_some(n))
            })
            .await
            .expect("condition met on third poll");

        assert_eq!(value, 2);
    }

    #[tokio::test]
    async fn times_out_instead_of_spinning_forever() {
        let result: VenueResult<()> = quick()
            .poll_until("position", &CancellationToken::new(), || async { Ok(None) })
            .await;

        assert!(matches!(result, Err(VenueError::Timeout { .. })));
    }

    #[tokio::test]
    async fn stops_when_cancelled() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let policy = PollPolicy::new(Duration::from_secs(5), Duration::from_secs(60));
        let result: VenueResult<()> = policy
            .poll_until("position", &shutdown, || async { Ok(None) })
            .await;

        assert!(matches!(result, Err(VenueError::Cancelled { .. })));
    }
}
