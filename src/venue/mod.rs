pub mod dry_run;
pub mod poll;
pub mod retry;
pub mod venue_error;

use std::sync::Arc;

use async_trait::async_trait;

use crate::execution::order_action::{OrderId, OrderRequest};
use crate::execution::types::OpenOrder;
use crate::market::order_book::OrderBook;
use crate::market::security::Security;
use crate::types::lease::{Asset, Lease, LeaseId, LeaseInput, LeaseRequest};
use crate::types::{price::Price, tick::Tick, ticker::Ticker};
use crate::venue::venue_error::VenueResult;

pub type DynamicVenue = Arc<dyn Venue>;

/// REST surface of the exchange. Every call is a single request; callers decide
/// whether a failure is retried.
#[async_trait]
pub trait Venue: Send + Sync {
    async fn tick(&self) -> VenueResult<Tick>;

    /// Close of the most recent completed bar.
    async fn last_close(&self, ticker: &Ticker) -> VenueResult<Price>;

    async fn order_book(&self, ticker: &Ticker, depth: u32) -> VenueResult<OrderBook>;

    async fn security(&self, ticker: &Ticker) -> VenueResult<Security>;

    async fn open_orders(&self) -> VenueResult<Vec<OpenOrder>>;

    async fn submit_order(&self, order: &OrderRequest) -> VenueResult<OrderId>;

    async fn cancel_orders(&self, ticker: &Ticker, order_ids: &[OrderId]) -> VenueResult<()>;

    async fn cancel_all(&self) -> VenueResult<()>;

    async fn leases(&self) -> VenueResult<Vec<Lease>>;

    /// Returns the lease when the venue echoes it back.
    async fn acquire_lease(&self, request: &LeaseRequest) -> VenueResult<Option<Lease>>;

    async fn use_lease(&self, id: LeaseId, inputs: &[LeaseInput]) -> VenueResult<()>;

    async fn release_lease(&self, id: LeaseId) -> VenueResult<()>;

    async fn assets(&self) -> VenueResult<Vec<Asset>>;
}
