use serde::Deserialize;
use tracing::{error, info, warn};

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
        lease::LeaseInput,
        tick::TickWindow,
        ticker::Ticker,
    },
    venue::venue_error::VenueError,
};

#[derive(Debug, Clone, Deserialize)]
pub struct RefineryConfig {
    #[serde(default = "default_schedule")]
    pub schedule: TickSchedule,

    #[serde(default = "default_crude")]
    pub crude: Ticker,

    #[serde(default = "default_storage")]
    pub storage: Ticker,

    /// Storage leases rented per cycle.
    #[serde(default = "default_storage_units")]
    pub storage_units: u32,

    #[serde(default = "default_quantity")]
    pub quantity: u32,

    #[serde(default = "default_refinery")]
    pub refinery: Ticker,

    #[serde(default = "default_products")]
    pub products: Vec<Ticker>,

    #[serde(default)]
    pub hedge: FuturesHedge,

    #[serde(default = "default_max_cycles")]
    pub max_cycles: u32,
}

impl Default for RefineryConfig {
    fn default() -> Self {
        Self {
            schedule: default_schedule(),
            crude: default_crude(),
            storage: default_storage(),
            storage_units: default_storage_units(),
            quantity: default_quantity(),
            refinery: default_refinery(),
            products: default_products(),
            hedge: FuturesHedge::default(),
            max_cycles: default_max_cycles(),
        }
    }
}

impl RefineryConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.schedule.validate()?;

        if self.quantity == 0 || self.storage_units == 0 {
            anyhow::bail!("refinery quantity and storage_units must be positive");
        }
        if self.products.is_empty() {
            anyhow::bail!("refinery needs at least one product");
        }
        if self.max_cycles == 0 {
            anyhow::bail!("refinery max_cycles must be positive");
        }
        Ok(())
    }
}

fn default_schedule() -> TickSchedule {
    TickSchedule {
        window: TickWindow::new(0, 601),
        ..TickSchedule::default()
    }
}

fn default_crude() -> Ticker {
    Ticker::from("CL")
}

fn default_storage() -> Ticker {
    Ticker::from("CL-STORAGE")
}

fn default_storage_units() -> u32 {
    3
}

fn default_quantity() -> u32 {
    30
}

fn default_refinery() -> Ticker {
    Ticker::from("CL-REFINERY")
}

fn default_products() -> Vec<Ticker> {
    vec![Ticker::from("HO"), Ticker::from("RB")]
}

fn default_max_cycles() -> u32 {
    25
}

/// Buys crude into leased storage, hedges it with short futures, refines it
/// into products and sells them, until the cycle cap or the tick window ends.
pub struct RefineryWorkflow {
    config: RefineryConfig,
    cycle: ConversionCycle,
}

impl RefineryWorkflow {
    pub fn new(config: RefineryConfig, cycle: ConversionCycle) -> Self {
        Self { config, cycle }
    }

    pub async fn run(&mut self) -> Result<Vec<CycleReport>, WorkflowError> {
        let schedule = self.config.schedule;
        let mut reports = Vec::new();

        info!(
            max_cycles = self.config.max_cycles,
            quantity = self.config.quantity,
            "refinery workflow starting"
        );

        let outcome = loop {
            if self.cycle.shutdown().is_cancelled() {
                info!("stop requested");
                break Ok(());
            }

            let tick = match self.cycle.venue().tick().await {
                Ok(tick) => tick,
                Err(error) if error.is_fatal() => break Err(error.into()),
                Err(error) => {
                    warn!(%error, "could not read tick");
                    pause(schedule.interval(), self.cycle.shutdown()).await;
                    continue;
                }
            };

            match schedule.decide(tick) {
                ScheduleDecision::Finished => {
                    info!(%tick, "tick window closed");
                    break Ok(());
                }
                ScheduleDecision::Skip(reason) => {
                    info!(?reason, "waiting for tick window");
                    pause(schedule.interval(), self.cycle.shutdown()).await;
                    continue;
                }
                ScheduleDecision::Evaluate => {}
            }

            match self.run_cycle().await {
                Ok(report) => {
                    reports.push(report);
                    if reports.len() as u32 >= self.config.max_cycles {
                        info!(cycles = reports.len(), "cycle cap reached");
                        break Ok(());
                    }
                }
                Err(error) => {
                    let config = &self.config;
                    let mut inventory = vec![&config.crude];
                    inventory.extend(config.products.iter());
                    self.cycle
                        .abort(&config.hedge, &inventory, &[&config.storage])
                        .await;

                    if error.is_cancelled() {
                        info!("stop requested mid-cycle");
                        break Ok(());
                    }
                    if error.is_fatal() {
                        error!(%error, "refinery cycle failed");
                        break Err(error);
                    }
                    warn!(%error, "refinery cycle abandoned");
                    pause(schedule.interval(), self.cycle.shutdown()).await;
                }
            }
        };

        self.cycle.settle(&self.config.hedge).await;
        self.release_refinery().await;
        outcome.map(|_| reports)
    }

    async fn run_cycle(&mut self) -> Result<CycleReport, WorkflowError> {
        let config = &self.config;
        let cycle = &mut self.cycle;

        cycle.lease_storage(&config.storage, config.storage_units).await?;
        cycle.buy_spot(&config.crude, config.quantity).await?;
        cycle.hedge(&config.hedge, config.quantity).await?;

        cycle.ensure_next(CycleState::RefineryLeased)?;
        let mut refinery = cycle.leases().ensure(&config.refinery).await?;
        cycle.advance(CycleState::RefineryLeased)?;

        let inputs = [LeaseInput {
            ticker: config.crude.clone(),
            quantity: config.quantity,
        }];

        let used = cycle.venue().use_lease(refinery, &inputs).await;
        match used {
            Err(VenueError::StaleLease { id }) => {
                warn!(%id, "refinery lease went stale, re-leasing");
                cycle.leases().refresh().await?;
                refinery = cycle.leases().ensure(&config.refinery).await?;
                cycle.venue().use_lease(refinery, &inputs).await?;
            }
            result => result?,
        }
        info!(lease = %refinery, quantity = config.quantity, "refining");
        cycle.advance(CycleState::Refined)?;

        cycle.release_storage(&config.storage).await?;

        let products = cycle.await_positions(&config.products, 1).await?;
        config.hedge.unwind(cycle.venue()).await?;
        cycle.sell_positions(&products).await?;
        cycle.advance(CycleState::ProductsSold)?;

        cycle.complete()
    }

    async fn release_refinery(&mut self) {
        let refinery = self.config.refinery.clone();

        match self.cycle.leases().release_all(&refinery).await {
            Ok(released) => info!(%refinery, released, "refinery lease released"),
            Err(error) => warn!(%refinery, %error, "could not release refinery lease"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::venue::{
        dry_run::{DryRunVenue, VenueCall},
        poll::PollPolicy,
    };

    fn workflow(dry_run: &Arc<DryRunVenue>, max_cycles: u32) -> RefineryWorkflow {
        let config = RefineryConfig {
            schedule: TickSchedule::new(TickWindow::new(0, 601), Duration::from_millis(1)),
            max_cycles,
            ..RefineryConfig::default()
        };

        workflow_with(dry_run, config, Duration::from_millis(500))
    }

    fn workflow_with(
        dry_run: &Arc<DryRunVenue>,
        config: RefineryConfig,
        poll_timeout: Duration,
    ) -> RefineryWorkflow {
        let cycle = ConversionCycle::new(
            dry_run.clone(),
            PollPolicy::new(Duration::from_millis(1), poll_timeout),
            CancellationToken::new(),
        );

        RefineryWorkflow::new(config, cycle)
    }

    async fn assert_flat(dry_run: &DryRunVenue) {
        for ticker in ["CL", "CL-1F", "CL-2F", "HO", "RB"] {
            assert_eq!(dry_run.position(ticker).await, 0, "{ticker}");
        }
        assert!(dry_run.held_leases().await.is_empty());
    }

    fn index_of(calls: &[VenueCall], predicate: impl Fn(&VenueCall) -> bool) -> usize {
        calls.iter().position(predicate).expect("call made")
    }

    #[tokio::test]
    async fn one_cycle_ends_flat_with_no_leases() {
        let dry_run = Arc::new(DryRunVenue::seeded());

        let reports = workflow(&dry_run, 1).run().await.expect("ran");

        assert_eq!(reports.len(), 1);
        assert_flat(&dry_run).await;
    }

    #[tokio::test]
    async fn abandoned_cycles_leave_nothing_open_when_the_window_closes() {
        let dry_run = Arc::new(DryRunVenue::seeded());
        let config = RefineryConfig {
            schedule: TickSchedule::new(TickWindow::new(0, 3), Duration::from_millis(1)),
            ..RefineryConfig::default()
        };

        // output never shows up within a zero timeout, so every cycle is abandoned
        let reports = workflow_with(&dry_run, config, Duration::ZERO)
            .run()
            .await
            .expect("window closes cleanly");

        assert!(reports.is_empty());
        assert_flat(&dry_run).await;
        assert!(dry_run.calls().await.iter().any(|call| {
            matches!(call, VenueCall::Submit(order) if order.ticker.as_str() == "HO")
        }));
    }

    #[tokio::test]
    async fn stale_refinery_lease_is_re_leased_and_the_cycle_completes() {
        let dry_run = Arc::new(DryRunVenue::seeded().expiring_lease_uses(1));

        let reports = workflow(&dry_run, 1).run().await.expect("ran");

        assert_eq!(reports.len(), 1);
        assert_flat(&dry_run).await;

        let calls = dry_run.calls().await;
        let refinery_leases = calls
            .iter()
            .filter(|call| {
                matches!(call, VenueCall::AcquireLease(request) if request.ticker.as_str() == "CL-REFINERY")
            })
            .count();
        let uses = calls
            .iter()
            .filter(|call| matches!(call, VenueCall::UseLease(..)))
            .count();

        assert_eq!(refinery_leases, 2);
        assert_eq!(uses, 2);
    }

    #[tokio::test]
    async fn storage_is_released_before_products_are_sold() {
        let dry_run = Arc::new(DryRunVenue::seeded());

        workflow(&dry_run, 1).run().await.expect("ran");

        let calls = dry_run.calls().await;

        let storage_leased = index_of(&calls, |call| {
            matches!(call, VenueCall::AcquireLease(request) if request.ticker.as_str() == "CL-STORAGE")
        });
        let crude_bought = index_of(&calls, |call| {
            matches!(call, VenueCall::Submit(order) if order.ticker.as_str() == "CL")
        });
        let refined = index_of(&calls, |call| matches!(call, VenueCall::UseLease(..)));
        let storage_released = index_of(&calls, |call| matches!(call, VenueCall::ReleaseLease(_)));
        let products_sold = index_of(&calls, |call| {
            matches!(call, VenueCall::Submit(order) if order.ticker.as_str() == "HO")
        });

        assert!(storage_leased < crude_bought);
        assert!(crude_bought < refined);
        assert!(refined < storage_released);
        assert!(storage_released < products_sold);
    }

    #[tokio::test]
    async fn cycle_cap_releases_refinery_and_stops() {
        let dry_run = Arc::new(DryRunVenue::seeded());

        let reports = workflow(&dry_run, 25).run().await.expect("ran");

        assert_eq!(reports.len(), 25);
        assert_eq!(reports.last().map(|report| report.cycle), Some(25));
        assert!(dry_run.held_leases().await.is_empty());

        let refinery_leases = dry_run
            .calls()
            .await
            .iter()
            .filter(|call| {
                matches!(call, VenueCall::AcquireLease(request) if request.ticker.as_str() == "CL-REFINERY")
            })
            .count();
        assert_eq!(refinery_leases, 1);
    }

    #[tokio::test]
    async fn auth_failure_is_fatal() {
        let dry_run = Arc::new(DryRunVenue::seeded().rejecting_auth());

        let error = workflow(&dry_run, 1).run().await.expect_err("fatal");

        assert!(error.is_fatal());
    }
}
