use std::fmt;

use serde::{Deserialize, Serialize};

/// Simulation time reported by the case endpoint.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tick(pub u32);

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
pub struct TickWindow {
    /// First tick (inclusive) the strategy is allowed to act on.
    pub start: Tick,

    /// Last tick (inclusive).
    pub end: Tick,
}

impl Default for TickWindow {
    fn default() -> Self {
        Self {
            start: Tick(1),
            end: Tick(300),
        }
    }
}

impl TickWindow {
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start: Tick(start),
            end: Tick(end),
        }
    }

    pub fn contains(&self, tick: Tick) -> bool {
        tick >= self.start && tick <= self.end
    }

    pub fn has_not_opened(&self, tick: Tick) -> bool {
        tick < self.start
    }

    pub fn has_closed(&self, tick: Tick) -> bool {
        tick > self.end
    }
}
