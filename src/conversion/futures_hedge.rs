use serde::Deserialize;
use tracing::info;

use crate::{
    errors::WorkflowError,
    execution::order_action::{OrderId, OrderRequest, Side},
    types::ticker::Ticker,
    venue::{DynamicVenue, venue_error::VenueResult},
};

/// Short futures offsetting a physical long.
///
/// The front maturity is used while it still trades; once its ask drops to
/// zero it has expired and the next maturity takes over.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FuturesHedge {
    #[serde(default = "default_front")]
    pub front: Ticker,

    #[serde(default = "default_next")]
    pub next: Ticker,
}

impl Default for FuturesHedge {
    fn default() -> Self {
        Self {
            front: default_front(),
            next: default_next(),
        }
    }
}

fn default_front() -> Ticker {
    Ticker::from("CL-1F")
}

fn default_next() -> Ticker {
    Ticker::from("CL-2F")
}

impl FuturesHedge {
    pub async fn select(&self, venue: &DynamicVenue) -> VenueResult<Ticker> {
        let front = venue.security(&self.front).await?;

        if front.ask.as_f64() > 0.0 {
            Ok(self.front.clone())
        } else {
            info!(expired = %self.front, using = %self.next, "front future expired");
            Ok(self.next.clone())
        }
    }

    /// Sells `quantity` of the live maturity at market.
    pub async fn hedge(&self, venue: &DynamicVenue, quantity: u32) -> VenueResult<(Ticker, OrderId)> {
        let ticker = self.select(venue).await?;
        let order_id = venue
            .submit_order(&OrderRequest::market(ticker.clone(), Side::Sell, quantity))
            .await?;

        info!(%ticker, quantity, %order_id, "hedge sold");
        Ok((ticker, order_id))
    }

    /// Closes whatever is open in either maturity with opposite market orders.
    pub async fn unwind(&self, venue: &DynamicVenue) -> Result<Vec<OrderRequest>, WorkflowError> {
        let mut sent = Vec::new();

        for ticker in [&self.front, &self.next] {
            let position = venue.security(ticker).await?.position;
            if position == 0 {
                continue;
            }

            let quantity =
                u32::try_from(position.unsigned_abs()).map_err(|_| WorkflowError::OversizedPosition {
                    ticker: ticker.clone(),
                    position,
                })?;
            let side = if position > 0 { Side::Sell } else { Side::Buy };
            let order = OrderRequest::market(ticker.clone(), side, quantity);

            venue.submit_order(&order).await?;
            info!(%ticker, %side, quantity, "hedge unwound");
            sent.push(order);
        }

        Ok(sent)
    }
}
