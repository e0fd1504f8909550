use std::time::Duration;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::scheduling::types::{ScheduleDecision, SkipReason};
use crate::types::tick::{Tick, TickWindow};

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TickSchedule {
    #[serde(default)]
    pub window: TickWindow,

    /// Pause between loop iterations.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for TickSchedule {
    fn default() -> Self {
        Self {
            window: TickWindow::default(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl TickSchedule {
    pub fn new(window: TickWindow, interval: Duration) -> Self {
        Self {
            window,
            interval_ms: interval.as_millis() as u64,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn decide(&self, tick: Tick) -> ScheduleDecision {
        if self.window.has_closed(tick) {
            ScheduleDecision::Finished
        } else if self.window.has_not_opened(tick) {
            ScheduleDecision::Skip(SkipReason::NotOpenYet {
                tick,
                opens_at: self.window.start,
            })
        } else {
            ScheduleDecision::Evaluate
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.window.start > self.window.end {
            anyhow::bail!(
                "tick window starts at {} after it ends at {}",
                self.window.start,
                self.window.end
            );
        }
        Ok(())
    }
}

/// Sleeps for `duration` unless a stop is requested first. Returns `false`
/// when stopped.
pub async fn pause(duration: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

fn default_interval_ms() -> u64 {
    250
}
