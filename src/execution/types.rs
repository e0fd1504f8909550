use crate::execution::order_action::{OrderId, OrderType, Side};
use crate::types::{price::Price, ticker::Ticker};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OrderStatus {
    Open,
    Transacted,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenOrder {
    pub order_id: OrderId,
    pub ticker: Ticker,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: f64,
    pub quantity_filled: f64,
    pub price: Option<Price>,
    pub status: OrderStatus,
}

impl OpenOrder {
    pub fn remaining(&self) -> f64 {
        (self.quantity - self.quantity_filled).max(0.0)
    }
}
