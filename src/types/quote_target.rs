use crate::execution::order_action::Side;
use crate::types::price::Price;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct QuoteOrder {
    pub side: Side,
    pub price: Price,
    pub quantity: u32,
}

impl QuoteOrder {
    pub fn buy(price: Price, quantity: u32) -> Self {
        Self {
            side: Side::Buy,
            price,
            quantity,
        }
    }

    pub fn sell(price: Price, quantity: u32) -> Self {
        Self {
            side: Side::Sell,
            price,
            quantity,
        }
    }
}

/// Limit orders a strategy wants resting after this iteration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteTarget {
    pub orders: Vec<QuoteOrder>,
}

impl QuoteTarget {
    pub fn new(orders: Vec<QuoteOrder>) -> Self {
        Self { orders }
    }

    pub fn bids(&self) -> impl Iterator<Item = &QuoteOrder> {
        self.orders.iter().filter(|order| order.side == Side::Buy)
    }

    pub fn asks(&self) -> impl Iterator<Item = &QuoteOrder> {
        self.orders.iter().filter(|order| order.side == Side::Sell)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NoQuoteReason {
    MissingTopOfBook,
    CrossedBook,
    PositionNotFlat { position: i64 },
    OrdersResting { count: usize },
    ImbalanceAtThreshold { ask_minus_bid: f64 },
    ZeroQuantity,
}
