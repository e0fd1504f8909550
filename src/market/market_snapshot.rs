use crate::execution::types::OpenOrder;
use crate::types::{
    order_book_stats::OrderBookStats, price::Price, quote::Quote, tick::Tick, ticker::Ticker,
};

/// Everything one loop iteration knows about an instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    pub ticker: Ticker,
    pub tick: Tick,
    pub close: Price,
    pub quote: Option<Quote>,
    pub stats: OrderBookStats,
    pub position: i64,
    /// Our resting orders in this instrument, oldest first.
    pub open_orders: Vec<OpenOrder>,
}

impl MarketSnapshot {
    pub fn is_flat(&self) -> bool {
        self.position == 0
    }
}
