use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
    execution::{
        order_action::{OrderId, OrderRequest, OrderType, Side},
        types::{OpenOrder, OrderStatus},
    },
    market::{
        order_book::{BookEntry, OrderBook},
        security::Security,
    },
    types::{
        lease::{Asset, Lease, LeaseId, LeaseInput, LeaseRequest},
        price::Price,
        tick::Tick,
        ticker::Ticker,
    },
    venue::{
        Venue,
        venue_error::{VenueError, VenueResult},
    },
};

/// Every venue call the dry run has served, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum VenueCall {
    Tick,
    LastClose(Ticker),
    OrderBook(Ticker),
    Security(Ticker),
    OpenOrders,
    Submit(OrderRequest),
    Cancel {
        ticker: Ticker,
        order_ids: Vec<OrderId>,
    },
    CancelAll,
    Leases,
    AcquireLease(LeaseRequest),
    UseLease(LeaseId, Vec<LeaseInput>),
    ReleaseLease(LeaseId),
    Assets,
}

/// Turns leased inputs into outputs: a refinery or a transport pipeline.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub input: Ticker,
    /// Output units per input unit.
    pub outputs: Vec<(Ticker, f64)>,
    /// Security reads before the outputs show up in positions.
    pub delay_polls: u32,
    /// Pipelines are consumed by a shipment; refineries stay leased.
    pub single_use: bool,
}

impl Conversion {
    pub fn refinery(input: impl Into<Ticker>, outputs: Vec<(Ticker, f64)>) -> Self {
        Self {
            input: input.into(),
            outputs,
            delay_polls: 2,
            single_use: false,
        }
    }

    pub fn pipeline(source: impl Into<Ticker>, destination: impl Into<Ticker>) -> Self {
        Self {
            input: source.into(),
            outputs: vec![(destination.into(), 1.0)],
            delay_polls: 2,
            single_use: true,
        }
    }
}

#[derive(Debug, Clone)]
struct SimulatedSecurity {
    book: OrderBook,
    close: Price,
    position: i64,
}

impl SimulatedSecurity {
    fn touch(&self) -> (Price, Price) {
        (
            self.book.best_bid().unwrap_or(self.close),
            self.book.best_ask().unwrap_or(self.close),
        )
    }
}

#[derive(Debug, Clone)]
struct StorageRequirement {
    storage: Ticker,
    units_per_lease: i64,
}

#[derive(Debug)]
struct Delivery {
    outputs: Vec<(Ticker, i64)>,
    polls_remaining: u32,
}

#[derive(Debug)]
struct DryRunState {
    tick: u32,
    tick_step: u32,
    securities: HashMap<Ticker, SimulatedSecurity>,
    resting: Vec<OpenOrder>,
    next_order_id: u64,
    leases: Vec<Lease>,
    next_lease_id: u64,
    assets: Vec<Asset>,
    conversions: HashMap<Ticker, Conversion>,
    storage: HashMap<Ticker, StorageRequirement>,
    deliveries: Vec<Delivery>,
    failing_submissions: u32,
    expiring_uses: u32,
    reject_auth: bool,
    calls: Vec<VenueCall>,
}

fn rejected(endpoint: &str, message: impl Into<String>) -> VenueError {
    VenueError::Rejected {
        endpoint: endpoint.to_string(),
        status: 400,
        message: message.into(),
    }
}

impl DryRunState {
    fn new() -> Self {
        Self {
            tick: 1,
            tick_step: 1,
            securities: HashMap::new(),
            resting: Vec::new(),
            next_order_id: 1,
            leases: Vec::new(),
            next_lease_id: 1,
            assets: Vec::new(),
            conversions: HashMap::new(),
            storage: HashMap::new(),
            deliveries: Vec::new(),
            failing_submissions: 0,
            expiring_uses: 0,
            reject_auth: false,
            calls: Vec::new(),
        }
    }

    fn serve(&mut self, call: VenueCall, endpoint: &str) -> VenueResult<()> {
        self.calls.push(call);

        if self.reject_auth {
            return Err(VenueError::Auth {
                endpoint: endpoint.to_string(),
            });
        }

        Ok(())
    }

    fn security(&self, ticker: &Ticker, endpoint: &str) -> VenueResult<&SimulatedSecurity> {
        self.securities
            .get(ticker)
            .ok_or_else(|| rejected(endpoint, format!("unknown ticker {ticker}")))
    }

    fn security_mut(
        &mut self,
        ticker: &Ticker,
        endpoint: &str,
    ) -> VenueResult<&mut SimulatedSecurity> {
        self.securities
            .get_mut(ticker)
            .ok_or_else(|| rejected(endpoint, format!("unknown ticker {ticker}")))
    }

    fn register_asset(&mut self, ticker: &Ticker, lease_price: f64) {
        if !self.assets.iter().any(|asset| asset.ticker == *ticker) {
            self.assets.push(Asset {
                ticker: ticker.clone(),
                lease_price,
            });
        }
    }

    fn held(&self, ticker: &Ticker) -> i64 {
        self.leases.iter().filter(|lease| lease.ticker == *ticker).count() as i64
    }

    fn new_lease(&mut self, ticker: Ticker) -> Lease {
        let lease = Lease {
            id: LeaseId(self.next_lease_id),
            ticker,
        };
        self.next_lease_id += 1;
        self.leases.push(lease.clone());
        lease
    }

    fn fill(&mut self, order: &OrderRequest, price: Price) -> VenueResult<()> {
        let delta = order.signed_quantity();
        let current = self.security(&order.ticker, "orders")?.position;

        if delta > 0 {
            if let Some(requirement) = self.storage.get(&order.ticker) {
                let capacity = self.held(&requirement.storage) * requirement.units_per_lease;
                if current + delta > capacity {
                    return Err(rejected(
                        "orders",
                        format!(
                            "insufficient {} for {} {}",
                            requirement.storage, order.quantity, order.ticker
                        ),
                    ));
                }
            }
        }

        self.security_mut(&order.ticker, "orders")?.position = current + delta;

        debug!(
            ticker = %order.ticker,
            side = %order.side,
            quantity = order.quantity,
            %price,
            position = current + delta,
            "dry run fill"
        );

        Ok(())
    }

    fn submit(&mut self, order: &OrderRequest) -> VenueResult<OrderId> {
        if self.failing_submissions > 0 {
            self.failing_submissions -= 1;
            return Err(VenueError::Server {
                endpoint: "orders".to_string(),
                status: 503,
            });
        }

        if order.quantity == 0 {
            return Err(rejected("orders", "quantity must be positive"));
        }

        let (bid, ask) = self.security(&order.ticker, "orders")?.touch();
        let touch = match order.side {
            Side::Buy => ask,
            Side::Sell => bid,
        };

        match order.order_type {
            OrderType::Market => self.fill(order, touch)?,
            OrderType::Limit => {
                let price = order
                    .price
                    .ok_or_else(|| rejected("orders", "limit order without price"))?;
                let marketable = match order.side {
                    Side::Buy => price >= ask,
                    Side::Sell => price <= bid,
                };

                if marketable {
                    self.fill(order, touch)?;
                } else {
                    self.resting.push(OpenOrder {
                        order_id: OrderId(self.next_order_id),
                        ticker: order.ticker.clone(),
                        side: order.side,
                        order_type: OrderType::Limit,
                        quantity: f64::from(order.quantity),
                        quantity_filled: 0.0,
                        price: Some(price),
                        status: OrderStatus::Open,
                    });
                }
            }
        }

        let order_id = OrderId(self.next_order_id);
        self.next_order_id += 1;

        Ok(order_id)
    }

    fn deliver(&mut self, outputs: Vec<(Ticker, i64)>) {
        for (ticker, quantity) in outputs {
            let Some(position) = self.securities.get(&ticker).map(|s| s.position) else {
                continue;
            };

            // destination storage is granted with the shipment
            if let Some(requirement) = self.storage.get(&ticker).cloned() {
                let needed = (position + quantity + requirement.units_per_lease - 1)
                    / requirement.units_per_lease;
                for _ in self.held(&requirement.storage)..needed {
                    self.new_lease(requirement.storage.clone());
                }
            }

            if let Some(security) = self.securities.get_mut(&ticker) {
                security.position += quantity;
            }
        }
    }

    fn advance_deliveries(&mut self) {
        let mut ready = Vec::new();

        self.deliveries.retain_mut(|delivery| {
            delivery.polls_remaining = delivery.polls_remaining.saturating_sub(1);
            if delivery.polls_remaining == 0 {
                ready.push(std::mem::take(&mut delivery.outputs));
                false
            } else {
                true
            }
        });

        for outputs in ready {
            self.deliver(outputs);
        }
    }

    fn convert(&mut self, lease: &Lease, inputs: &[LeaseInput]) -> VenueResult<()> {
        let endpoint = "leases";
        let conversion = self
            .conversions
            .get(&lease.ticker)
            .cloned()
            .ok_or_else(|| rejected(endpoint, format!("{} cannot be used", lease.ticker)))?;

        let mut outputs = Vec::new();

        for input in inputs {
            if input.ticker != conversion.input {
                return Err(rejected(
                    endpoint,
                    format!("{} does not accept {}", lease.ticker, input.ticker),
                ));
            }

            let security = self.security_mut(&input.ticker, endpoint)?;
            let quantity = i64::from(input.quantity);
            if security.position < quantity {
                return Err(rejected(
                    endpoint,
                    format!("insufficient {} to convert", input.ticker),
                ));
            }
            security.position -= quantity;

            for (output, ratio) in &conversion.outputs {
                outputs.push((output.clone(), (quantity as f64 * ratio).round() as i64));
            }
        }

        if conversion.single_use {
            self.leases.retain(|held| held.id != lease.id);
        }

        if conversion.delay_polls == 0 {
            self.deliver(outputs);
        } else {
            self.deliveries.push(Delivery {
                outputs,
                polls_remaining: conversion.delay_polls,
            });
        }

        Ok(())
    }
}

/// Deterministic in-memory venue.
///
/// Market orders and marketable limits fill at the touch immediately; other
/// limits rest until cancelled. Storage-backed tickers can only be bought
/// into leased capacity, and refinery or pipeline outputs arrive after a few
/// security reads.
#[derive(Debug)]
pub struct DryRunVenue {
    state: Mutex<DryRunState>,
}

impl Default for DryRunVenue {
    fn default() -> Self {
        Self::new()
    }
}

impl DryRunVenue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DryRunState::new()),
        }
    }

    /// Market-making and commodity universe used by `--venue dry-run`.
    pub fn seeded() -> Self {
        Self::new()
            .with_quote("ALGO", 9.98, 10.02, 10.00)
            .with_quote("CNR", 6.98, 7.02, 7.00)
            .with_quote("RY", 23.98, 24.02, 24.00)
            .with_quote("AC", 14.98, 15.02, 15.00)
            .with_quote("CL", 24.95, 25.05, 25.00)
            .with_quote("CL-1F", 25.40, 25.50, 25.45)
            .with_quote("CL-2F", 25.80, 25.90, 25.85)
            .with_quote("HO", 31.90, 32.10, 32.00)
            .with_quote("RB", 29.90, 30.10, 30.00)
            .with_quote("CL-AK", 22.95, 23.05, 23.00)
            .with_quote("CL-NYC", 27.95, 28.05, 28.00)
            .with_storage("CL", "CL-STORAGE", 10)
            .with_storage("CL-AK", "AK-STORAGE", 10)
            .with_storage("CL-NYC", "NYC-STORAGE", 10)
            .with_conversion(
                "CL-REFINERY",
                Conversion::refinery(
                    "CL",
                    vec![(Ticker::from("HO"), 1.0 / 3.0), (Ticker::from("RB"), 2.0 / 3.0)],
                ),
            )
            .with_conversion("CS-NYC-PIPE", Conversion::pipeline("CL", "CL-NYC"))
            .with_conversion("AK-CS-PIPE", Conversion::pipeline("CL-AK", "CL"))
            .with_asset("CL-REFINERY", 50_000.0)
            .with_asset("CS-NYC-PIPE", 15_000.0)
            .with_asset("AK-CS-PIPE", 20_000.0)
    }

    pub fn with_security(mut self, ticker: impl Into<Ticker>, book: OrderBook, close: f64) -> Self {
        self.state.get_mut().securities.insert(
            ticker.into(),
            SimulatedSecurity {
                book,
                close: Price::new(close),
                position: 0,
            },
        );
        self
    }

    /// One anonymous level of 10 000 on each side.
    pub fn with_quote(self, ticker: impl Into<Ticker>, bid: f64, ask: f64, close: f64) -> Self {
        let level = |price: f64| BookEntry {
            order_id: None,
            trader_id: "ANON".to_string(),
            price: Price::new(price),
            quantity: 10_000.0,
            quantity_filled: 0.0,
        };

        let book = OrderBook {
            bids: vec![level(bid)],
            asks: vec![level(ask)],
        };

        self.with_security(ticker, book, close)
    }

    pub fn with_position(mut self, ticker: impl Into<Ticker>, position: i64) -> Self {
        let ticker: Ticker = ticker.into();
        if let Some(security) = self.state.get_mut().securities.get_mut(&ticker) {
            security.position = position;
        }
        self
    }

    /// Tick reported by the first `tick()` call and the step added by every call.
    pub fn with_ticks(mut self, start: u32, step: u32) -> Self {
        let state = self.state.get_mut();
        state.tick = start;
        state.tick_step = step;
        self
    }

    pub fn with_asset(mut self, ticker: impl Into<Ticker>, lease_price: f64) -> Self {
        let state = self.state.get_mut();
        let ticker = ticker.into();

        state.register_asset(&ticker, lease_price);
        for asset in state.assets.iter_mut().filter(|asset| asset.ticker == ticker) {
            asset.lease_price = lease_price;
        }
        self
    }

    pub fn with_conversion(mut self, lease_ticker: impl Into<Ticker>, conversion: Conversion) -> Self {
        let state = self.state.get_mut();
        let lease_ticker = lease_ticker.into();

        state.register_asset(&lease_ticker, 0.0);
        state.conversions.insert(lease_ticker, conversion);
        self
    }

    /// Long positions in `ticker` need one `storage` lease per `units_per_lease`.
    pub fn with_storage(
        mut self,
        ticker: impl Into<Ticker>,
        storage: impl Into<Ticker>,
        units_per_lease: i64,
    ) -> Self {
        let state = self.state.get_mut();
        let storage = storage.into();

        state.register_asset(&storage, 0.0);
        state.storage.insert(
            ticker.into(),
            StorageRequirement {
                storage,
                units_per_lease: units_per_lease.max(1),
            },
        );
        self
    }

    pub fn with_resting_order(
        mut self,
        ticker: impl Into<Ticker>,
        side: Side,
        price: f64,
        quantity: u32,
    ) -> Self {
        let state = self.state.get_mut();
        let order_id = OrderId(state.next_order_id);
        state.next_order_id += 1;

        state.resting.push(OpenOrder {
            order_id,
            ticker: ticker.into(),
            side,
            order_type: OrderType::Limit,
            quantity: f64::from(quantity),
            quantity_filled: 0.0,
            price: Some(Price::new(price)),
            status: OrderStatus::Open,
        });
        self
    }

    pub fn with_lease(mut self, ticker: impl Into<Ticker>) -> Self {
        let state = self.state.get_mut();
        let ticker = ticker.into();

        state.register_asset(&ticker, 0.0);
        state.new_lease(ticker);
        self
    }

    /// The next `count` order submissions fail with a 503.
    pub fn failing_submissions(mut self, count: u32) -> Self {
        self.state.get_mut().failing_submissions = count;
        self
    }

    /// The next `count` lease uses find their lease already expired: the
    /// lease is dropped and the use fails as stale.
    pub fn expiring_lease_uses(mut self, count: u32) -> Self {
        self.state.get_mut().expiring_uses = count;
        self
    }

    pub fn rejecting_auth(mut self) -> Self {
        self.state.get_mut().reject_auth = true;
        self
    }

    pub async fn calls(&self) -> Vec<VenueCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn position(&self, ticker: &str) -> i64 {
        self.state
            .lock()
            .await
            .securities
            .get(&Ticker::from(ticker))
            .map(|security| security.position)
            .unwrap_or_default()
    }

    pub async fn resting_orders(&self) -> Vec<OpenOrder> {
        self.state.lock().await.resting.clone()
    }

    pub async fn held_leases(&self) -> Vec<Lease> {
        self.state.lock().await.leases.clone()
    }
}

#[async_trait]
impl Venue for DryRunVenue {
    async fn tick(&self) -> VenueResult<Tick> {
        let mut state = self.state.lock().await;
        state.serve(VenueCall::Tick, "case")?;

        let tick = state.tick;
        state.tick = state.tick.saturating_add(state.tick_step);

        Ok(Tick(tick))
    }

    async fn last_close(&self, ticker: &Ticker) -> VenueResult<Price> {
        let mut state = self.state.lock().await;
        state.serve(VenueCall::LastClose(ticker.clone()), "securities/history")?;

        state
            .securities
            .get(ticker)
            .map(|security| security.close)
            .ok_or_else(|| {
                VenueError::malformed("securities/history", format!("no history for {ticker}"))
            })
    }

    async fn order_book(&self, ticker: &Ticker, depth: u32) -> VenueResult<OrderBook> {
        let mut state = self.state.lock().await;
        state.serve(VenueCall::OrderBook(ticker.clone()), "securities/book")?;

        let book = &state.security(ticker, "securities/book")?.book;
        let depth = depth as usize;

        Ok(OrderBook {
            bids: book.bids.iter().take(depth).cloned().collect(),
            asks: book.asks.iter().take(depth).cloned().collect(),
        })
    }

    async fn security(&self, ticker: &Ticker) -> VenueResult<Security> {
        let mut state = self.state.lock().await;
        state.serve(VenueCall::Security(ticker.clone()), "securities")?;
        state.advance_deliveries();

        let security = state.security(ticker, "securities")?;
        let (bid, ask) = security.touch();

        Ok(Security {
            ticker: ticker.clone(),
            position: security.position,
            bid,
            ask,
            last: security.close,
        })
    }

    async fn open_orders(&self) -> VenueResult<Vec<OpenOrder>> {
        let mut state = self.state.lock().await;
        state.serve(VenueCall::OpenOrders, "orders")?;

        let mut orders = state.resting.clone();
        orders.sort_by_key(|order| order.order_id);

        Ok(orders)
    }

    async fn submit_order(&self, order: &OrderRequest) -> VenueResult<OrderId> {
        let mut state = self.state.lock().await;
        state.serve(VenueCall::Submit(order.clone()), "orders")?;

        state.submit(order)
    }

    async fn cancel_orders(&self, ticker: &Ticker, order_ids: &[OrderId]) -> VenueResult<()> {
        let mut state = self.state.lock().await;
        state.serve(
            VenueCall::Cancel {
                ticker: ticker.clone(),
                order_ids: order_ids.to_vec(),
            },
            "commands/cancel",
        )?;

        state
            .resting
            .retain(|order| !(order.ticker == *ticker && order_ids.contains(&order.order_id)));

        Ok(())
    }

    async fn cancel_all(&self) -> VenueResult<()> {
        let mut state = self.state.lock().await;
        state.serve(VenueCall::CancelAll, "commands/cancel")?;

        info!(cancelled = state.resting.len(), "dry run cancelling all orders");
        state.resting.clear();

        Ok(())
    }

    async fn leases(&self) -> VenueResult<Vec<Lease>> {
        let mut state = self.state.lock().await;
        state.serve(VenueCall::Leases, "leases")?;

        Ok(state.leases.clone())
    }

    async fn acquire_lease(&self, request: &LeaseRequest) -> VenueResult<Option<Lease>> {
        let mut state = self.state.lock().await;
        state.serve(VenueCall::AcquireLease(request.clone()), "leases")?;

        if !state.assets.iter().any(|asset| asset.ticker == request.ticker) {
            return Err(rejected(
                "leases",
                format!("{} is not leasable", request.ticker),
            ));
        }

        let lease = state.new_lease(request.ticker.clone());

        if request.inputs.is_empty() {
            return Ok(Some(lease));
        }

        if let Err(error) = state.convert(&lease, &request.inputs) {
            state.leases.retain(|held| held.id != lease.id);
            return Err(error);
        }

        let still_held = state.leases.iter().any(|held| held.id == lease.id);
        Ok(still_held.then_some(lease))
    }

    async fn use_lease(&self, id: LeaseId, inputs: &[LeaseInput]) -> VenueResult<()> {
        let mut state = self.state.lock().await;
        state.serve(VenueCall::UseLease(id, inputs.to_vec()), "leases")?;

        let lease = state
            .leases
            .iter()
            .find(|lease| lease.id == id)
            .cloned()
            .ok_or(VenueError::StaleLease { id })?;

        if state.expiring_uses > 0 {
            state.expiring_uses -= 1;
            state.leases.retain(|held| held.id != id);
            return Err(VenueError::StaleLease { id });
        }

        state.convert(&lease, inputs)
    }

    async fn release_lease(&self, id: LeaseId) -> VenueResult<()> {
        let mut state = self.state.lock().await;
        state.serve(VenueCall::ReleaseLease(id), "leases")?;

        let before = state.leases.len();
        state.leases.retain(|lease| lease.id != id);

        if state.leases.len() == before {
            return Err(VenueError::StaleLease { id });
        }

        Ok(())
    }

    async fn assets(&self) -> VenueResult<Vec<Asset>> {
        let mut state = self.state.lock().await;
        state.serve(VenueCall::Assets, "assets")?;

        Ok(state.assets.clone())
    }
}
