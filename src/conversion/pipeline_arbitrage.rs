use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::{
    conversion::{
        conversion_cycle::ConversionCycle,
        cycle_state::{CycleReport, CycleState},
        futures_hedge::FuturesHedge,
    },
    errors::WorkflowError,
    scheduling::{
        tick_schedule::{TickSchedule, pause},
        types::ScheduleDecision,
    },
    types::{
        lease::{Asset, LeaseRequest},
        price::Price,
        tick::TickWindow,
        ticker::Ticker,
    },
    venue::venue_error::VenueResult,
};

/// Moves crude from `source` to `destination` through a leased pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PipelineRoute {
    pub source: Ticker,
    pub destination: Ticker,
    pub pipeline: Ticker,
    pub source_storage: Ticker,
    pub destination_storage: Ticker,
}

impl PipelineRoute {
    pub fn new(
        source: &str,
        destination: &str,
        pipeline: &str,
        source_storage: &str,
        destination_storage: &str,
    ) -> Self {
        Self {
            source: Ticker::from(source),
            destination: Ticker::from(destination),
            pipeline: Ticker::from(pipeline),
            source_storage: Ticker::from(source_storage),
            destination_storage: Ticker::from(destination_storage),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineArbitrageConfig {
    #[serde(default = "default_schedule")]
    pub schedule: TickSchedule,

    #[serde(default = "default_routes")]
    pub routes: Vec<PipelineRoute>,

    /// Units bought and shipped per transfer.
    #[serde(default = "default_quantity")]
    pub quantity: u32,

    /// Units per pipeline lease; the transfer ships in batches of this size.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    #[serde(default = "default_storage_units")]
    pub storage_units: u32,

    /// Barrels per contract.
    #[serde(default = "default_contract_size")]
    pub contract_size: f64,

    /// Required edge per batch on top of the pipeline lease price.
    #[serde(default = "default_min_profit")]
    pub min_profit: f64,

    #[serde(default)]
    pub hedge: FuturesHedge,

    /// Stop after this many transfers. Unbounded when absent.
    #[serde(default)]
    pub max_cycles: Option<u32>,
}

impl Default for PipelineArbitrageConfig {
    fn default() -> Self {
        Self {
            schedule: default_schedule(),
            routes: default_routes(),
            quantity: default_quantity(),
            batch_size: default_batch_size(),
            storage_units: default_storage_units(),
            contract_size: default_contract_size(),
            min_profit: default_min_profit(),
            hedge: FuturesHedge::default(),
            max_cycles: None,
        }
    }
}

impl PipelineArbitrageConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.schedule.validate()?;

        if self.routes.is_empty() {
            anyhow::bail!("pipeline arbitrage needs at least one route");
        }
        if self.quantity == 0 || self.batch_size == 0 || self.storage_units == 0 {
            anyhow::bail!("pipeline quantity, batch_size and storage_units must be positive");
        }
        if !(self.contract_size.is_finite() && self.contract_size > 0.0) {
            anyhow::bail!("contract_size must be positive, got {}", self.contract_size);
        }
        if !self.min_profit.is_finite() {
            anyhow::bail!("min_profit must be finite");
        }
        Ok(())
    }

    /// Profit of one batch after paying for the pipeline lease.
    pub fn batch_profit(&self, source_close: Price, destination_close: Price, pipeline_price: f64) -> f64 {
        let barrels = self.contract_size * f64::from(self.batch_size);

        (destination_close - source_close) * barrels - pipeline_price
    }

    pub fn is_profitable(&self, source_close: Price, destination_close: Price, pipeline_price: f64) -> bool {
        self.batch_profit(source_close, destination_close, pipeline_price) > self.min_profit
    }

    fn batches(&self) -> impl Iterator<Item = u32> + '_ {
        let full = self.quantity / self.batch_size;
        let rest = self.quantity % self.batch_size;

        std::iter::repeat_n(self.batch_size, full as usize).chain((rest > 0).then_some(rest))
    }
}

fn default_schedule() -> TickSchedule {
    TickSchedule {
        window: TickWindow::new(0, 601),
        ..TickSchedule::default()
    }
}

fn default_routes() -> Vec<PipelineRoute> {
    vec![
        PipelineRoute::new("CL", "CL-NYC", "CS-NYC-PIPE", "CL-STORAGE", "NYC-STORAGE"),
        PipelineRoute::new("CL-AK", "CL", "AK-CS-PIPE", "AK-STORAGE", "CL-STORAGE"),
    ]
}

fn default_quantity() -> u32 {
    30
}

fn default_batch_size() -> u32 {
    10
}

fn default_storage_units() -> u32 {
    3
}

fn default_contract_size() -> f64 {
    1000.0
}

fn default_min_profit() -> f64 {
    10_000.0
}

/// Watches the configured routes and ships crude whenever the destination
/// close beats the source close by more than the pipeline costs.
pub struct PipelineArbitrage {
    config: PipelineArbitrageConfig,
    cycle: ConversionCycle,
}

impl PipelineArbitrage {
    pub fn new(config: PipelineArbitrageConfig, cycle: ConversionCycle) -> Self {
        Self { config, cycle }
    }

    pub async fn run(&mut self) -> Result<Vec<CycleReport>, WorkflowError> {
        let schedule = self.config.schedule;
        let mut reports = Vec::new();

        info!(routes = self.config.routes.len(), "pipeline arbitrage starting");

        loop {
            if self.cycle.shutdown().is_cancelled() {
                info!("stop requested");
                break;
            }

            let tick = match self.cycle.venue().tick().await {
                Ok(tick) => tick,
                Err(error) if error.is_fatal() => return Err(error.into()),
                Err(error) => {
                    warn!(%error, "could not read tick");
                    pause(schedule.interval(), self.cycle.shutdown()).await;
                    continue;
                }
            };

            match schedule.decide(tick) {
                ScheduleDecision::Finished => {
                    info!(%tick, "tick window closed");
                    break;
                }
                ScheduleDecision::Skip(reason) => {
                    debug!(?reason, "waiting for tick window");
                }
                ScheduleDecision::Evaluate => {
                    if self.scan_routes(&mut reports).await? {
                        break;
                    }
                }
            }

            pause(schedule.interval(), self.cycle.shutdown()).await;
        }

        self.cycle.settle(&self.config.hedge).await;
        Ok(reports)
    }

    fn cap_reached(&self, completed: usize) -> bool {
        self.config
            .max_cycles
            .is_some_and(|cap| completed as u32 >= cap)
    }

    /// One pass over every route. Returns `true` once the workflow should stop.
    async fn scan_routes(&mut self, reports: &mut Vec<CycleReport>) -> Result<bool, WorkflowError> {
        let assets = match self.cycle.venue().assets().await {
            Ok(assets) => assets,
            Err(error) if error.is_fatal() => return Err(error.into()),
            Err(error) => {
                warn!(%error, "could not read lease prices");
                return Ok(false);
            }
        };

        for route in self.config.routes.clone() {
            let Some(pipeline_price) = lease_price(&assets, &route.pipeline) else {
                warn!(pipeline = %route.pipeline, "pipeline not offered");
                continue;
            };

            let (source_close, destination_close) = match self.closes(&route).await {
                Ok(closes) => closes,
                Err(error) if error.is_fatal() => return Err(error.into()),
                Err(error) => {
                    warn!(%error, source = %route.source, "could not read closes");
                    continue;
                }
            };

            let profit = self
                .config
                .batch_profit(source_close, destination_close, pipeline_price);

            if !self
                .config
                .is_profitable(source_close, destination_close, pipeline_price)
            {
                debug!(
                    source = %route.source,
                    destination = %route.destination,
                    profit,
                    "route not profitable"
                );
                continue;
            }

            info!(
                source = %route.source,
                destination = %route.destination,
                %source_close,
                %destination_close,
                pipeline_price,
                profit,
                "shipping"
            );

            match self.transfer(&route).await {
                Ok(report) => {
                    reports.push(report);
                    if self.cap_reached(reports.len()) {
                        info!(transfers = reports.len(), "transfer cap reached");
                        return Ok(true);
                    }
                }
                Err(error) => {
                    self.cycle
                        .abort(
                            &self.config.hedge,
                            &[&route.source, &route.destination],
                            &[&route.source_storage, &route.destination_storage],
                        )
                        .await;

                    if error.is_cancelled() {
                        return Ok(true);
                    }
                    if error.is_fatal() {
                        error!(%error, "pipeline transfer failed");
                        return Err(error);
                    }
                    warn!(%error, "pipeline transfer abandoned");
                }
            }
        }

        Ok(false)
    }

    async fn closes(&self, route: &PipelineRoute) -> VenueResult<(Price, Price)> {
        let venue = self.cycle.venue();

        Ok((
            venue.last_close(&route.source).await?,
            venue.last_close(&route.destination).await?,
        ))
    }

    async fn transfer(&mut self, route: &PipelineRoute) -> Result<CycleReport, WorkflowError> {
        let config = &self.config;
        let cycle = &mut self.cycle;

        cycle
            .lease_storage(&route.source_storage, config.storage_units)
            .await?;
        cycle.buy_spot(&route.source, config.quantity).await?;
        cycle.hedge(&config.hedge, config.quantity).await?;

        cycle.ensure_next(CycleState::RefineryLeased)?;
        for batch in config.batches() {
            // each lease-and-use consumes its pipeline lease
            cycle
                .leases()
                .acquire(&LeaseRequest::rent_and_use(
                    route.pipeline.clone(),
                    route.source.clone(),
                    batch,
                ))
                .await?;
            debug!(pipeline = %route.pipeline, batch, "batch shipped");
        }
        cycle.advance(CycleState::RefineryLeased)?;
        cycle.advance(CycleState::Refined)?;

        cycle.release_storage(&route.source_storage).await?;

        let delivered = cycle
            .await_positions(std::slice::from_ref(&route.destination), i64::from(config.quantity))
            .await?;
        cycle.sell_positions(&delivered).await?;
        config.hedge.unwind(cycle.venue()).await?;
        cycle.advance(CycleState::ProductsSold)?;

        let released = cycle.leases().release_all(&route.destination_storage).await?;
        info!(storage = %route.destination_storage, released, "destination storage released");

        cycle.complete()
    }
}

fn lease_price(assets: &[Asset], ticker: &Ticker) -> Option<f64> {
    assets
        .iter()
        .find(|asset| asset.ticker == *ticker)
        .map(|asset| asset.lease_price)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::venue::{dry_run::DryRunVenue, poll::PollPolicy};

    fn arbitrage(dry_run: &Arc<DryRunVenue>, routes: Vec<PipelineRoute>) -> PipelineArbitrage {
        arbitrage_with_timeout(dry_run, routes, Duration::from_millis(500))
    }

    fn arbitrage_with_timeout(
        dry_run: &Arc<DryRunVenue>,
        routes: Vec<PipelineRoute>,
        poll_timeout: Duration,
    ) -> PipelineArbitrage {
        let config = PipelineArbitrageConfig {
            schedule: TickSchedule::new(TickWindow::new(0, 5), Duration::from_millis(1)),
            routes,
            max_cycles: Some(1),
            ..PipelineArbitrageConfig::default()
        };
        let cycle = ConversionCycle::new(
            dry_run.clone(),
            PollPolicy::new(Duration::from_millis(1), poll_timeout),
            CancellationToken::new(),
        );

        PipelineArbitrage::new(config, cycle)
    }

    #[test]
    fn profit_check_pays_for_the_pipeline() {
        let config = PipelineArbitrageConfig::default();

        // 3.00 × 10 000 barrels − 15 000 lease = 15 000 > 10 000
        assert!(config.is_profitable(Price::new(25.0), Price::new(28.0), 15_000.0));
        // 1.00 × 10 000 barrels − 15 000 lease is a loss
        assert!(!config.is_profitable(Price::new(25.0), Price::new(26.0), 15_000.0));
        // exactly the minimum is not enough
        assert!(!config.is_profitable(Price::new(25.0), Price::new(27.5), 15_000.0));
    }

    #[test]
    fn transfer_ships_in_batches() {
        let config = PipelineArbitrageConfig {
            quantity: 25,
            ..PipelineArbitrageConfig::default()
        };

        assert_eq!(config.batches().collect::<Vec<_>>(), vec![10, 10, 5]);
    }

    #[tokio::test]
    async fn profitable_route_runs_a_full_transfer() {
        let dry_run = Arc::new(DryRunVenue::seeded());
        let route = PipelineRoute::new("CL", "CL-NYC", "CS-NYC-PIPE", "CL-STORAGE", "NYC-STORAGE");

        let reports = arbitrage(&dry_run, vec![route]).run().await.expect("ran");

        assert_eq!(reports.len(), 1);
        for ticker in ["CL", "CL-NYC", "CL-1F", "CL-2F"] {
            assert_eq!(dry_run.position(ticker).await, 0, "{ticker}");
        }
        assert!(dry_run.held_leases().await.is_empty());
    }

    #[tokio::test]
    async fn undelivered_transfer_is_sold_off_and_hedge_closed() {
        let dry_run = Arc::new(DryRunVenue::seeded());
        let route = PipelineRoute::new("CL", "CL-NYC", "CS-NYC-PIPE", "CL-STORAGE", "NYC-STORAGE");

        let reports = arbitrage_with_timeout(&dry_run, vec![route], Duration::ZERO)
            .run()
            .await
            .expect("window closes cleanly");

        assert!(reports.is_empty());
        for ticker in ["CL", "CL-NYC", "CL-1F", "CL-2F"] {
            assert_eq!(dry_run.position(ticker).await, 0, "{ticker}");
        }
        assert!(dry_run.held_leases().await.is_empty());
    }

    #[tokio::test]
    async fn unprofitable_route_never_trades() {
        let dry_run = Arc::new(DryRunVenue::seeded().with_quote("CL-NYC", 25.45, 25.55, 25.50));
        let route = PipelineRoute::new("CL", "CL-NYC", "CS-NYC-PIPE", "CL-STORAGE", "NYC-STORAGE");

        let reports = arbitrage(&dry_run, vec![route]).run().await.expect("ran");

        assert!(reports.is_empty());
        assert!(dry_run.held_leases().await.is_empty());
        assert_eq!(dry_run.position("CL").await, 0);
    }
}
