use crate::execution::order_action::OrderId;
use crate::types::{price::Price, quote::Quote};

#[derive(Debug, Clone, PartialEq)]
pub struct BookEntry {
    pub order_id: Option<OrderId>,
    pub trader_id: String,
    pub price: Price,
    pub quantity: f64,
    pub quantity_filled: f64,
}

impl BookEntry {
    pub fn remaining(&self) -> f64 {
        (self.quantity - self.quantity_filled).max(0.0)
    }
}

/// Resting depth, best level first on both sides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderBook {
    pub bids: Vec<BookEntry>,
    pub asks: Vec<BookEntry>,
}

impl OrderBook {
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.first().map(|entry| entry.price)
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.first().map(|entry| entry.price)
    }

    pub fn quote(&self) -> Option<Quote> {
        Some(Quote {
            bid: self.best_bid()?,
            ask: self.best_ask()?,
        })
    }
}
