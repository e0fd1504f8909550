use crate::types::{price::Price, ticker::Ticker};

/// Per-ticker account view: our net position plus the venue's touch.
#[derive(Debug, Clone, PartialEq)]
pub struct Security {
    pub ticker: Ticker,
    pub position: i64,
    pub bid: Price,
    pub ask: Price,
    pub last: Price,
}
