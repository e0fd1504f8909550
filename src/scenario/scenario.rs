use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    config::Config,
    conversion::{
        conversion_cycle::ConversionCycle, pipeline_arbitrage::PipelineArbitrage,
        refinery::RefineryWorkflow,
    },
    rit::{rit_config::RitConfig, rit_venue::RitVenue},
    runner::quoting_loop::QuotingLoop,
    scenario::{strategies::StrategyKind, venues::VenueKind},
    strategy::strategies::{imbalance_mm::ImbalanceMarketMaker, liquidity_ladder::LiquidityLadder},
    types::instrument_rules::InstrumentRules,
    venue::{DynamicVenue, dry_run::DryRunVenue},
};

pub struct Scenario;

impl Scenario {
    pub fn venue(kind: VenueKind, config: &Config) -> Result<DynamicVenue> {
        info!(venue = %kind, "creating venue");

        let venue: DynamicVenue = match kind {
            VenueKind::DryRun => Arc::new(DryRunVenue::seeded()),
            VenueKind::Rit => {
                let rit_config = RitConfig::from_env()?;

                Arc::new(RitVenue::new(rit_config, config.retry)?)
            }
        };

        Ok(venue)
    }

    pub async fn run(
        kind: StrategyKind,
        venue: DynamicVenue,
        config: &Config,
        shutdown: CancellationToken,
    ) -> Result<()> {
        info!(strategy = %kind, "running strategy");

        match kind {
            StrategyKind::BasicMarketMaker => {
                let instruments = required(&config.market_making.instruments, "market_making")?;
                let mut quoting = Self::quoting_loop(venue, config, shutdown);

                for rules in instruments {
                    quoting = quoting
                        .with_instrument(rules.clone(), Box::new(ImbalanceMarketMaker::new(rules)));
                }

                quoting.run().await.context("market making stopped")
            }
            StrategyKind::LiquidityMarketMaker => {
                let section = &config.liquidity_ladder;
                let instruments = required(&section.instruments, "liquidity_ladder")?;
                let mut quoting = Self::quoting_loop(venue, config, shutdown);

                for rules in instruments {
                    quoting = quoting.with_instrument(
                        rules.clone(),
                        Box::new(LiquidityLadder::new(rules, section.ladder.clone())),
                    );
                }

                quoting.run().await.context("liquidity ladder stopped")
            }
            StrategyKind::Refinery => {
                let cycle = ConversionCycle::new(venue, config.poll, shutdown);
                let reports = RefineryWorkflow::new(config.refinery.clone(), cycle)
                    .run()
                    .await
                    .context("refinery workflow stopped")?;

                info!(cycles = reports.len(), "refinery workflow finished");
                Ok(())
            }
            StrategyKind::PipelineArbitrage => {
                let cycle = ConversionCycle::new(venue, config.poll, shutdown);
                let reports = PipelineArbitrage::new(config.pipeline_arbitrage.clone(), cycle)
                    .run()
                    .await
                    .context("pipeline arbitrage stopped")?;

                info!(transfers = reports.len(), "pipeline arbitrage finished");
                Ok(())
            }
        }
    }

    fn quoting_loop(venue: DynamicVenue, config: &Config, shutdown: CancellationToken) -> QuotingLoop {
        QuotingLoop::new(venue, config.retry, config.poll, config.schedule, shutdown)
    }
}

fn required<'a>(instruments: &'a [InstrumentRules], section: &str) -> Result<&'a [InstrumentRules]> {
    if instruments.is_empty() {
        bail!("{section}.instruments is empty");
    }
    Ok(instruments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn market_making_needs_instruments() {
        let config = Config::default();
        let venue = Scenario::venue(VenueKind::DryRun, &config).expect("dry run");

        let result = Scenario::run(
            StrategyKind::BasicMarketMaker,
            venue,
            &config,
            CancellationToken::new(),
        )
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn stopped_workflow_returns_cleanly() {
        let config = Config::default();
        let venue = Scenario::venue(VenueKind::DryRun, &config).expect("dry run");
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        Scenario::run(StrategyKind::Refinery, venue, &config, shutdown)
            .await
            .expect("stops before the first cycle");
    }
}
