use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::errors::WorkflowError;

/// Steps of one storage → buy → hedge → convert → sell cycle.
///
/// Pipeline transfers reuse the same ladder: `RefineryLeased` is the
/// pipeline lease being taken and `Refined` the shipment leaving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CycleState {
    NoStorage,
    StorageLeased,
    OilBought,
    FutureHedged,
    RefineryLeased,
    Refined,
    StorageReleased,
    ProductsSold,
    CycleComplete,
}

impl CycleState {
    pub fn next(self) -> Option<CycleState> {
        use CycleState::*;

        match self {
            NoStorage => Some(StorageLeased),
            StorageLeased => Some(OilBought),
            OilBought => Some(FutureHedged),
            FutureHedged => Some(RefineryLeased),
            RefineryLeased => Some(Refined),
            Refined => Some(StorageReleased),
            StorageReleased => Some(ProductsSold),
            ProductsSold => Some(CycleComplete),
            CycleComplete => None,
        }
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoStorage => "no-storage",
            Self::StorageLeased => "storage-leased",
            Self::OilBought => "oil-bought",
            Self::FutureHedged => "future-hedged",
            Self::RefineryLeased => "refinery-leased",
            Self::Refined => "refined",
            Self::StorageReleased => "storage-released",
            Self::ProductsSold => "products-sold",
            Self::CycleComplete => "cycle-complete",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub steps: Vec<(CycleState, DateTime<Utc>)>,
}

/// Enforces the cycle order: every step must be the direct successor of the
/// current one, and a new cycle starts only from `CycleComplete`.
#[derive(Debug, Clone)]
pub struct CycleTracker {
    state: CycleState,
    completed: u32,
    started_at: DateTime<Utc>,
    steps: Vec<(CycleState, DateTime<Utc>)>,
}

impl Default for CycleTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleTracker {
    pub fn new() -> Self {
        Self {
            state: CycleState::NoStorage,
            completed: 0,
            started_at: Utc::now(),
            steps: Vec::new(),
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn completed_cycles(&self) -> u32 {
        self.completed
    }

    pub fn ensure_next(&self, to: CycleState) -> Result<(), WorkflowError> {
        if self.state.next() == Some(to) {
            Ok(())
        } else {
            Err(WorkflowError::IllegalTransition {
                from: self.state,
                to,
            })
        }
    }

    pub fn advance(&mut self, to: CycleState) -> Result<(), WorkflowError> {
        self.ensure_next(to)?;

        if self.state == CycleState::NoStorage {
            self.started_at = Utc::now();
            self.steps.clear();
        }

        self.state = to;
        self.steps.push((to, Utc::now()));

        if to == CycleState::CycleComplete {
            self.completed += 1;
        }

        Ok(())
    }

    /// Closes a completed cycle and starts the next one.
    pub fn restart(&mut self) -> Result<CycleReport, WorkflowError> {
        if self.state != CycleState::CycleComplete {
            return Err(WorkflowError::IllegalTransition {
                from: self.state,
                to: CycleState::NoStorage,
            });
        }

        let report = CycleReport {
            cycle: self.completed,
            started_at: self.started_at,
            completed_at: Utc::now(),
            steps: std::mem::take(&mut self.steps),
        };

        info!(
            cycle = report.cycle,
            elapsed_ms = (report.completed_at - report.started_at).num_milliseconds(),
            "conversion cycle complete"
        );

        self.state = CycleState::NoStorage;
        Ok(report)
    }

    /// Drops an unfinished cycle after its leases have been cleaned up.
    pub fn abandon(&mut self) {
        if self.state != CycleState::NoStorage {
            warn!(state = %self.state, "abandoning conversion cycle");
        }

        self.state = CycleState::NoStorage;
        self.steps.clear();
    }
}
