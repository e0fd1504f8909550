use std::str::FromStr;

use serde::Deserialize;

use crate::execution::order_action::{OrderId, OrderType, Side};
use crate::execution::types::{OpenOrder, OrderStatus};
use crate::market::order_book::{BookEntry, OrderBook};
use crate::market::security::Security;
use crate::types::lease::{Asset, Lease, LeaseId};
use crate::types::{price::Price, ticker::Ticker};
use crate::venue::venue_error::{VenueError, VenueResult};

#[derive(Debug, Deserialize)]
pub struct CaseResponse {
    pub tick: u32,
}

#[derive(Debug, Deserialize)]
pub struct HistoryBar {
    pub tick: u32,
    pub close: f64,
}

#[derive(Debug, Deserialize)]
pub struct BookResponse {
    #[serde(default)]
    pub bids: Vec<BookEntryResponse>,
    #[serde(default)]
    pub asks: Vec<BookEntryResponse>,
}

#[derive(Debug, Deserialize)]
pub struct BookEntryResponse {
    #[serde(default)]
    pub order_id: Option<u64>,
    #[serde(default)]
    pub trader_id: String,
    pub price: f64,
    pub quantity: f64,
    #[serde(default)]
    pub quantity_filled: f64,
}

#[derive(Debug, Deserialize)]
pub struct SecurityResponse {
    pub ticker: String,
    pub position: f64,
    #[serde(default)]
    pub bid: f64,
    #[serde(default)]
    pub ask: f64,
    #[serde(default)]
    pub last: f64,
}

#[derive(Debug, Deserialize)]
pub struct OrderResponse {
    pub order_id: u64,
    pub ticker: String,
    #[serde(rename = "type")]
    pub order_type: String,
    pub quantity: f64,
    #[serde(default)]
    pub quantity_filled: f64,
    pub action: String,
    #[serde(default)]
    pub price: Option<f64>,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct LeaseResponse {
    pub id: u64,
    pub ticker: String,
}

#[derive(Debug, Deserialize)]
pub struct AssetResponse {
    pub ticker: String,
    #[serde(default)]
    pub lease_price: f64,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of a 429; `wait` is in seconds.
#[derive(Debug, Deserialize)]
pub struct RateLimitBody {
    pub wait: f64,
}

fn price(endpoint: &str, field: &str, value: f64) -> VenueResult<Price> {
    Price::try_new(value)
        .ok_or_else(|| VenueError::malformed(endpoint, format!("invalid {field}: {value}")))
}

impl BookResponse {
    pub fn into_book(self, endpoint: &str) -> VenueResult<OrderBook> {
        let convert = |entries: Vec<BookEntryResponse>| -> VenueResult<Vec<BookEntry>> {
            entries
                .into_iter()
                .map(|entry| {
                    Ok(BookEntry {
                        order_id: entry.order_id.map(OrderId),
                        trader_id: entry.trader_id,
                        price: price(endpoint, "book price", entry.price)?,
                        quantity: entry.quantity,
                        quantity_filled: entry.quantity_filled,
                    })
                })
                .collect()
        };

        Ok(OrderBook {
            bids: convert(self.bids)?,
            asks: convert(self.asks)?,
        })
    }
}

impl SecurityResponse {
    pub fn into_security(self, endpoint: &str) -> VenueResult<Security> {
        Ok(Security {
            ticker: Ticker::new(self.ticker),
            position: self.position.round() as i64,
            bid: price(endpoint, "bid", self.bid)?,
            ask: price(endpoint, "ask", self.ask)?,
            last: price(endpoint, "last", self.last)?,
        })
    }
}

impl OrderResponse {
    pub fn into_open_order(self, endpoint: &str) -> VenueResult<OpenOrder> {
        let side = Side::from_str(&self.action)
            .map_err(|e| VenueError::malformed(endpoint, e.to_string()))?;
        let order_type = OrderType::from_str(&self.order_type)
            .map_err(|e| VenueError::malformed(endpoint, e.to_string()))?;

        let status = match self.status.to_uppercase().as_str() {
            "OPEN" => OrderStatus::Open,
            "TRANSACTED" => OrderStatus::Transacted,
            "CANCELLED" => OrderStatus::Cancelled,
            other => {
                return Err(VenueError::malformed(
                    endpoint,
                    format!("unknown order status {other}"),
                ));
            }
        };

        let price = match self.price {
            Some(value) => Some(price(endpoint, "order price", value)?),
            None => None,
        };

        Ok(OpenOrder {
            order_id: OrderId(self.order_id),
            ticker: Ticker::new(self.ticker),
            side,
            order_type,
            quantity: self.quantity,
            quantity_filled: self.quantity_filled,
            price,
            status,
        })
    }
}

impl From<LeaseResponse> for Lease {
    fn from(lease: LeaseResponse) -> Self {
        Lease {
            id: LeaseId(lease.id),
            ticker: Ticker::new(lease.ticker),
        }
    }
}

impl From<AssetResponse> for Asset {
    fn from(asset: AssetResponse) -> Self {
        Asset {
            ticker: Ticker::new(asset.ticker),
            lease_price: asset.lease_price,
        }
    }
}
