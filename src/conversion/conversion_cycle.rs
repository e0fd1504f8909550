use std::collections::BTreeSet;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    conversion::{
        cycle_state::{CycleReport, CycleState, CycleTracker},
        futures_hedge::FuturesHedge,
        lease_registry::LeaseRegistry,
    },
    errors::WorkflowError,
    execution::order_action::{OrderRequest, Side},
    types::{lease::LeaseRequest, ticker::Ticker},
    venue::{DynamicVenue, poll::PollPolicy},
};

/// Shared steps of the refinery and pipeline workflows. Every step checks the
/// cycle order before it touches the venue.
pub struct ConversionCycle {
    venue: DynamicVenue,
    poll: PollPolicy,
    shutdown: CancellationToken,
    leases: LeaseRegistry,
    tracker: CycleTracker,
    /// Inventory of abandoned cycles whose conversion output may still land.
    unsettled: BTreeSet<Ticker>,
}

impl ConversionCycle {
    pub fn new(venue: DynamicVenue, poll: PollPolicy, shutdown: CancellationToken) -> Self {
        Self {
            leases: LeaseRegistry::new(venue.clone()),
            venue,
            poll,
            shutdown,
            tracker: CycleTracker::new(),
            unsettled: BTreeSet::new(),
        }
    }

    pub fn venue(&self) -> &DynamicVenue {
        &self.venue
    }

    pub fn shutdown(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub fn state(&self) -> CycleState {
        self.tracker.state()
    }

    pub fn leases(&mut self) -> &mut LeaseRegistry {
        &mut self.leases
    }

    pub fn ensure_next(&self, to: CycleState) -> Result<(), WorkflowError> {
        self.tracker.ensure_next(to)
    }

    pub fn advance(&mut self, to: CycleState) -> Result<(), WorkflowError> {
        self.tracker.advance(to)
    }

    /// Rents `units` storage leases.
    pub async fn lease_storage(&mut self, storage: &Ticker, units: u32) -> Result<(), WorkflowError> {
        self.ensure_next(CycleState::StorageLeased)?;

        for _ in 0..units {
            self.leases
                .acquire(&LeaseRequest::rent(storage.clone()))
                .await?
                .ok_or_else(|| WorkflowError::LeaseUnavailable {
                    ticker: storage.clone(),
                })?;
        }

        info!(%storage, units, "storage leased");
        self.advance(CycleState::StorageLeased)
    }

    pub async fn buy_spot(&mut self, ticker: &Ticker, quantity: u32) -> Result<(), WorkflowError> {
        self.ensure_next(CycleState::OilBought)?;

        let order_id = self
            .venue
            .submit_order(&OrderRequest::market(ticker.clone(), Side::Buy, quantity))
            .await?;

        info!(%ticker, quantity, %order_id, "spot bought");
        self.advance(CycleState::OilBought)
    }

    pub async fn hedge(&mut self, hedge: &FuturesHedge, quantity: u32) -> Result<Ticker, WorkflowError> {
        self.ensure_next(CycleState::FutureHedged)?;

        let (ticker, _) = hedge.hedge(&self.venue, quantity).await?;

        self.advance(CycleState::FutureHedged)?;
        Ok(ticker)
    }

    pub async fn release_storage(&mut self, storage: &Ticker) -> Result<(), WorkflowError> {
        self.ensure_next(CycleState::StorageReleased)?;

        let released = self.leases.release_all(storage).await?;

        info!(%storage, released, "storage released");
        self.advance(CycleState::StorageReleased)
    }

    /// Polls until every ticker holds at least `minimum` units.
    pub async fn await_positions(
        &self,
        tickers: &[Ticker],
        minimum: i64,
    ) -> Result<Vec<(Ticker, i64)>, WorkflowError> {
        let venue = &self.venue;

        let positions = self
            .poll
            .poll_until("conversion output", &self.shutdown, || async move {
                let mut positions = Vec::with_capacity(tickers.len());
                for ticker in tickers {
                    let position = venue.security(ticker).await?.position;
                    if position < minimum {
                        return Ok(None);
                    }
                    positions.push((ticker.clone(), position));
                }
                Ok(Some(positions))
            })
            .await?;

        info!(?positions, "conversion output arrived");
        Ok(positions)
    }

    /// Sells every long position at market.
    pub async fn sell_positions(&self, positions: &[(Ticker, i64)]) -> Result<(), WorkflowError> {
        for (ticker, position) in positions.iter().filter(|(_, position)| *position > 0) {
            let quantity = u32::try_from(*position).map_err(|_| WorkflowError::OversizedPosition {
                ticker: ticker.clone(),
                position: *position,
            })?;

            let order_id = self
                .venue
                .submit_order(&OrderRequest::market(ticker.clone(), Side::Sell, quantity))
                .await?;

            info!(%ticker, quantity, %order_id, "output sold");
        }

        Ok(())
    }

    pub fn complete(&mut self) -> Result<CycleReport, WorkflowError> {
        self.advance(CycleState::CycleComplete)?;
        self.tracker.restart()
    }

    /// Closes the hedge and sells every long position in `inventory` at
    /// market. Failures are logged, never returned.
    pub async fn liquidate(&self, hedge: &FuturesHedge, inventory: &[&Ticker]) {
        if let Err(error) = hedge.unwind(&self.venue).await {
            warn!(%error, "could not unwind hedge");
        }

        for ticker in inventory {
            let position = match self.venue.security(ticker).await {
                Ok(security) => security.position,
                Err(error) => {
                    warn!(%ticker, %error, "could not read inventory");
                    continue;
                }
            };

            if let Err(error) = self.sell_positions(&[((*ticker).clone(), position)]).await {
                warn!(%ticker, position, %error, "could not sell inventory");
            }
        }
    }

    /// Best-effort cleanup of a failed cycle: unwinds the hedge, sells any
    /// inventory already bought or delivered, releases every lease held on
    /// `storages` and resets the cycle.
    pub async fn abort(
        &mut self,
        hedge: &FuturesHedge,
        inventory: &[&Ticker],
        storages: &[&Ticker],
    ) {
        self.liquidate(hedge, inventory).await;

        for storage in storages {
            if let Err(error) = self.leases.release_all(storage).await {
                warn!(%storage, %error, "could not release leases after failed cycle");
            }
        }

        self.unsettled.extend(inventory.iter().map(|ticker| (*ticker).clone()));
        self.tracker.abandon();
    }

    /// Sells output of abandoned cycles that arrived after their cleanup.
    /// Called once when a workflow stops.
    pub async fn settle(&mut self, hedge: &FuturesHedge) {
        if self.unsettled.is_empty() {
            return;
        }

        let unsettled = std::mem::take(&mut self.unsettled);
        let inventory: Vec<&Ticker> = unsettled.iter().collect();

        info!(inventory = ?inventory, "settling abandoned cycles");
        self.liquidate(hedge, &inventory).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::venue::{
        Venue,
        dry_run::{DryRunVenue, VenueCall},
    };

    fn cycle(dry_run: &Arc<DryRunVenue>) -> ConversionCycle {
        ConversionCycle::new(
            dry_run.clone(),
            PollPolicy::new(Duration::from_millis(1), Duration::from_millis(500)),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn buying_without_storage_is_refused_before_any_order() {
        let dry_run = Arc::new(DryRunVenue::seeded());
        let mut cycle = cycle(&dry_run);

        let error = cycle
            .buy_spot(&Ticker::from("CL"), 30)
            .await
            .expect_err("storage comes first");

        assert!(matches!(error, WorkflowError::IllegalTransition { .. }));
        assert!(dry_run.calls().await.is_empty());
    }

    #[tokio::test]
    async fn storage_then_spot_then_hedge() {
        let dry_run = Arc::new(DryRunVenue::seeded());
        let mut cycle = cycle(&dry_run);
        let crude = Ticker::from("CL");

        cycle
            .lease_storage(&Ticker::from("CL-STORAGE"), 3)
            .await
            .expect("leased");
        cycle.buy_spot(&crude, 30).await.expect("bought");
        cycle.hedge(&FuturesHedge::default(), 30).await.expect("hedged");

        assert_eq!(cycle.state(), CycleState::FutureHedged);
        assert_eq!(dry_run.position("CL").await, 30);
        assert_eq!(dry_run.position("CL-1F").await, -30);

        let calls = dry_run.calls().await;
        let first_buy = calls
            .iter()
            .position(|call| matches!(call, VenueCall::Submit(order) if order.ticker == crude))
            .expect("spot order");
        let leases_before = calls[..first_buy]
            .iter()
            .filter(|call| matches!(call, VenueCall::AcquireLease(_)))
            .count();
        assert_eq!(leases_before, 3);
    }

    #[tokio::test]
    async fn abort_releases_storage_and_resets() {
        let dry_run = Arc::new(DryRunVenue::seeded());
        let mut cycle = cycle(&dry_run);
        let storage = Ticker::from("CL-STORAGE");

        cycle.lease_storage(&storage, 3).await.expect("leased");
        cycle.abort(&FuturesHedge::default(), &[], &[&storage]).await;

        assert_eq!(cycle.state(), CycleState::NoStorage);
        assert!(dry_run.held_leases().await.is_empty());
    }

    #[tokio::test]
    async fn abort_unwinds_hedge_and_sells_spot_before_releasing_storage() {
        let dry_run = Arc::new(DryRunVenue::seeded());
        let mut cycle = cycle(&dry_run);
        let storage = Ticker::from("CL-STORAGE");
        let crude = Ticker::from("CL");
        let hedge = FuturesHedge::default();

        cycle.lease_storage(&storage, 3).await.expect("leased");
        cycle.buy_spot(&crude, 30).await.expect("bought");
        cycle.hedge(&hedge, 30).await.expect("hedged");

        cycle.abort(&hedge, &[&crude], &[&storage]).await;

        assert_eq!(cycle.state(), CycleState::NoStorage);
        assert_eq!(dry_run.position("CL").await, 0);
        assert_eq!(dry_run.position("CL-1F").await, 0);
        assert!(dry_run.held_leases().await.is_empty());

        let calls = dry_run.calls().await;
        let crude_sold = calls
            .iter()
            .position(|call| {
                matches!(call, VenueCall::Submit(order) if order.ticker == crude && order.side == Side::Sell)
            })
            .expect("spot sold");
        let storage_released = calls
            .iter()
            .position(|call| matches!(call, VenueCall::ReleaseLease(_)))
            .expect("storage released");
        assert!(crude_sold < storage_released);
    }

    #[tokio::test]
    async fn settle_sells_output_that_landed_after_abort() {
        let dry_run = Arc::new(
            DryRunVenue::seeded()
                .with_lease("CL-STORAGE")
                .with_lease("CL-STORAGE")
                .with_lease("CL-STORAGE")
                .with_position("CL", 30),
        );
        let mut cycle = cycle(&dry_run);
        let product = Ticker::from("HO");
        let hedge = FuturesHedge::default();

        cycle.abort(&hedge, &[&product], &[]).await;

        dry_run
            .acquire_lease(&LeaseRequest::rent_and_use(
                Ticker::from("CL-REFINERY"),
                Ticker::from("CL"),
                30,
            ))
            .await
            .expect("refining");

        cycle.settle(&hedge).await;
        assert_eq!(dry_run.position("HO").await, 0);

        let calls = dry_run.calls().await.len();
        cycle.settle(&hedge).await;
        assert_eq!(dry_run.calls().await.len(), calls);
    }

    #[tokio::test]
    async fn waits_for_conversion_output() {
        let dry_run = Arc::new(DryRunVenue::seeded().with_lease("CL-STORAGE").with_position("CL", 10));
        let cycle = cycle(&dry_run);

        dry_run
            .acquire_lease(&LeaseRequest::rent_and_use(
                Ticker::from("CS-NYC-PIPE"),
                Ticker::from("CL"),
                10,
            ))
            .await
            .expect("shipped");

        let positions = cycle
            .await_positions(&[Ticker::from("CL-NYC")], 10)
            .await
            .expect("delivered");

        assert_eq!(positions, vec![(Ticker::from("CL-NYC"), 10)]);
    }
}
