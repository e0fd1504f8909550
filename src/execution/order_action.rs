use anyhow::{Result, anyhow};

use crate::types::{price::Price, ticker::Ticker};
use std::{fmt, str::FromStr};

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Side {
    #[default]
    Buy,
    Sell,
}

impl Side {
    /// +1 for buys, -1 for sells: the direction a fill moves the position.
    pub fn sign(self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

impl FromStr for Side {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "BUY" => Ok(Self::Buy),
            "SELL" => Ok(Self::Sell),
            other => Err(anyhow!("unknown side: {other}")),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OrderType {
    Market,
    Limit,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit => write!(f, "LIMIT"),
        }
    }
}

impl FromStr for OrderType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "MARKET" => Ok(Self::Market),
            "LIMIT" => Ok(Self::Limit),
            other => Err(anyhow!("unknown order type: {other}")),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub ticker: Ticker,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: u32,
    /// Only set for limit orders.
    pub price: Option<Price>,
}

impl OrderRequest {
    pub fn limit(ticker: Ticker, side: Side, quantity: u32, price: Price) -> Self {
        Self {
            ticker,
            side,
            order_type: OrderType::Limit,
            quantity,
            price: Some(price),
        }
    }

    pub fn market(ticker: Ticker, side: Side, quantity: u32) -> Self {
        Self {
            ticker,
            side,
            order_type: OrderType::Market,
            quantity,
            price: None,
        }
    }

    /// Position change if the order fills completely.
    pub fn signed_quantity(&self) -> i64 {
        self.side.sign() * i64::from(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderAction {
    CancelAll,
    Cancel {
        ticker: Ticker,
        order_ids: Vec<OrderId>,
    },
    Place(OrderRequest),
}
