use crate::market::order_book::OrderBook;
use crate::types::counterparty::CounterpartyFilter;

/// Depth aggregated over the book entries accepted by a counterparty filter.
///
/// Volumes are summed quantities, order counts are the number of entries.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OrderBookStats {
    pub bid_volume: f64,
    pub bid_orders: u32,
    pub ask_volume: f64,
    pub ask_orders: u32,
}

impl OrderBookStats {
    pub fn from_book(book: &OrderBook, filter: &CounterpartyFilter) -> Self {
        let mut stats = Self::default();

        for entry in book.bids.iter().filter(|e| filter.matches(&e.trader_id)) {
            stats.bid_volume += entry.remaining();
            stats.bid_orders += 1;
        }

        for entry in book.asks.iter().filter(|e| filter.matches(&e.trader_id)) {
            stats.ask_volume += entry.remaining();
            stats.ask_orders += 1;
        }

        stats
    }

    pub fn ask_minus_bid_volume(&self) -> f64 {
        self.ask_volume - self.bid_volume
    }
}
