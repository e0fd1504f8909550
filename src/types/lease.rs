use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::ticker::Ticker;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeaseId(pub u64);

impl fmt::Display for LeaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A rented storage, pipeline or refinery slot as reported by the venue.
#[derive(Debug, Clone, PartialEq)]
pub struct Lease {
    pub id: LeaseId,
    pub ticker: Ticker,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseInput {
    pub ticker: Ticker,
    pub quantity: u32,
}

/// Request for a new lease. Non-empty `inputs` lease and use the asset in one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseRequest {
    pub ticker: Ticker,
    pub inputs: Vec<LeaseInput>,
}

impl LeaseRequest {
    pub fn rent(ticker: Ticker) -> Self {
        Self {
            ticker,
            inputs: Vec::new(),
        }
    }

    pub fn rent_and_use(ticker: Ticker, input: Ticker, quantity: u32) -> Self {
        Self {
            ticker,
            inputs: vec![LeaseInput {
                ticker: input,
                quantity,
            }],
        }
    }
}

/// Leasable asset with its current rental price.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub ticker: Ticker,
    pub lease_price: f64,
}
