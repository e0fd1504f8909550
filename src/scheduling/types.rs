use crate::types::tick::Tick;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleDecision {
    Evaluate,
    Skip(SkipReason),
    /// The window has closed; the loop should stop.
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotOpenYet { tick: Tick, opens_at: Tick },
}
