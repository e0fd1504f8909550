use thiserror::Error;

use crate::conversion::cycle_state::CycleState;
use crate::types::ticker::Ticker;
use crate::venue::venue_error::VenueError;

/// Failures of multi-step flows built on top of the venue: risk flattening and
/// conversion cycles.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Venue(#[from] VenueError),

    #[error("illegal conversion step {from:?} -> {to:?}")]
    IllegalTransition { from: CycleState, to: CycleState },

    #[error("{ticker} still at {position} after {rounds} flatten rounds")]
    FlattenIncomplete {
        ticker: Ticker,
        position: i64,
        rounds: u32,
    },

    #[error("venue did not grant a {ticker} lease")]
    LeaseUnavailable { ticker: Ticker },

    #[error("position {position} in {ticker} is too large for one order")]
    OversizedPosition { ticker: Ticker, position: i64 },
}

impl WorkflowError {
    /// Errors after which the process must stop rather than skip an iteration.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Venue(error) => error.is_fatal(),
            Self::IllegalTransition { .. } | Self::FlattenIncomplete { .. } => true,
            Self::LeaseUnavailable { .. } | Self::OversizedPosition { .. } => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Venue(VenueError::Cancelled { .. }))
    }
}
