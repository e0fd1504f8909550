use async_trait::async_trait;

use crate::{
    execution::{
        order_action::{OrderId, OrderRequest, OrderType},
        types::OpenOrder,
    },
    market::{order_book::OrderBook, security::Security},
    rit::{rit_client::RitClient, rit_config::RitConfig},
    types::{
        lease::{Asset, Lease, LeaseId, LeaseInput, LeaseRequest},
        price::Price,
        tick::Tick,
        ticker::Ticker,
    },
    venue::{
        Venue,
        retry::RetryPolicy,
        venue_error::{VenueError, VenueResult},
    },
};

/// Reads are retried on transient failures; order, cancel and lease mutations
/// are sent once.
#[derive(Debug, Clone)]
pub struct RitVenue {
    client: RitClient,
    retry: RetryPolicy,
}

impl RitVenue {
    pub fn new(config: RitConfig, retry: RetryPolicy) -> anyhow::Result<Self> {
        Ok(Self {
            client: RitClient::new(config)?,
            retry,
        })
    }
}

fn input_params(inputs: &[LeaseInput]) -> Vec<(&'static str, String)> {
    const FROM: [&str; 3] = ["from1", "from2", "from3"];
    const QUANTITY: [&str; 3] = ["quantity1", "quantity2", "quantity3"];

    inputs
        .iter()
        .take(FROM.len())
        .enumerate()
        .flat_map(|(i, input)| {
            [
                (FROM[i], input.ticker.to_string()),
                (QUANTITY[i], input.quantity.to_string()),
            ]
        })
        .collect()
}

fn order_params(order: &OrderRequest) -> VenueResult<Vec<(&'static str, String)>> {
    let mut params = vec![
        ("ticker", order.ticker.to_string()),
        ("type", order.order_type.to_string()),
        ("quantity", order.quantity.to_string()),
        ("action", order.side.to_string()),
    ];

    match (order.order_type, order.price) {
        (OrderType::Limit, Some(price)) => params.push(("price", format!("{:.2}", price.as_f64()))),
        (OrderType::Limit, None) => {
            return Err(VenueError::Rejected {
                endpoint: "orders".to_string(),
                status: 0,
                message: format!("limit order for {} without a price", order.ticker),
            });
        }
        (OrderType::Market, _) => {}
    }

    Ok(params)
}

#[async_trait]
impl Venue for RitVenue {
    async fn tick(&self) -> VenueResult<Tick> {
        let case = self.retry.run("case", || self.client.case()).await?;

        Ok(Tick(case.tick))
    }

    async fn last_close(&self, ticker: &Ticker) -> VenueResult<Price> {
        let history = self
            .retry
            .run("securities/history", || {
                self.client.history(ticker.as_str(), 1)
            })
            .await?;

        let bar = history.first().ok_or_else(|| {
            VenueError::malformed("securities/history", format!("no history for {ticker}"))
        })?;

        Price::try_new(bar.close).ok_or_else(|| {
            VenueError::malformed("securities/history", format!("invalid close {}", bar.close))
        })
    }

    async fn order_book(&self, ticker: &Ticker, depth: u32) -> VenueResult<OrderBook> {
        let book = self
            .retry
            .run("securities/book", || self.client.book(ticker.as_str(), depth))
            .await?;

        book.into_book("securities/book")
    }

    async fn security(&self, ticker: &Ticker) -> VenueResult<Security> {
        let securities = self
            .retry
            .run("securities", || self.client.securities(ticker.as_str()))
            .await?;

        securities
            .into_iter()
            .find(|security| Ticker::new(security.ticker.as_str()) == *ticker)
            .ok_or_else(|| VenueError::malformed("securities", format!("{ticker} not listed")))?
            .into_security("securities")
    }

    async fn open_orders(&self) -> VenueResult<Vec<OpenOrder>> {
        let orders = self
            .retry
            .run("orders", || self.client.orders("OPEN"))
            .await?;

        orders
            .into_iter()
            .map(|order| order.into_open_order("orders"))
            .collect()
    }

    async fn submit_order(&self, order: &OrderRequest) -> VenueResult<OrderId> {
        let params = order_params(order)?;
        let response = self.client.post_order(params).await?;

        tracing::debug!(
            order_id = response.order_id,
            ticker = %order.ticker,
            side = %order.side,
            quantity = order.quantity,
            "order accepted"
        );

        Ok(OrderId(response.order_id))
    }

    async fn cancel_orders(&self, ticker: &Ticker, order_ids: &[OrderId]) -> VenueResult<()> {
        if order_ids.is_empty() {
            return Ok(());
        }

        let ids = order_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        tracing::info!(%ticker, %ids, "cancelling orders");

        self.client
            .bulk_cancel(vec![("ticker", ticker.to_string()), ("ids", ids)])
            .await
    }

    async fn cancel_all(&self) -> VenueResult<()> {
        self.client.bulk_cancel(vec![("all", "1".to_string())]).await
    }

    async fn leases(&self) -> VenueResult<Vec<Lease>> {
        let leases = self.retry.run("leases", || self.client.leases()).await?;

        Ok(leases.into_iter().map(Lease::from).collect())
    }

    async fn acquire_lease(&self, request: &LeaseRequest) -> VenueResult<Option<Lease>> {
        let mut params = vec![("ticker", request.ticker.to_string())];
        params.extend(input_params(&request.inputs));

        let lease = self.client.post_lease(params).await?;

        Ok(lease.map(Lease::from))
    }

    async fn use_lease(&self, id: LeaseId, inputs: &[LeaseInput]) -> VenueResult<()> {
        match self.client.use_lease(id.0, input_params(inputs)).await {
            Err(VenueError::Rejected { status: 404, .. }) => Err(VenueError::StaleLease { id }),
            other => other,
        }
    }

    async fn release_lease(&self, id: LeaseId) -> VenueResult<()> {
        match self.client.delete_lease(id.0).await {
            Err(VenueError::Rejected { status: 404, .. }) => Err(VenueError::StaleLease { id }),
            other => other,
        }
    }

    async fn assets(&self) -> VenueResult<Vec<Asset>> {
        let assets = self.retry.run("assets", || self.client.assets()).await?;

        Ok(assets.into_iter().map(Asset::from).collect())
    }
}
