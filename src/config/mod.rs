pub mod strategy_config;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::{
    config::strategy_config::{LiquidityLadderConfig, MarketMakingConfig},
    conversion::{pipeline_arbitrage::PipelineArbitrageConfig, refinery::RefineryConfig},
    scheduling::tick_schedule::TickSchedule,
    venue::{poll::PollPolicy, retry::RetryPolicy},
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Tick window and pace of the market-making loops.
    #[serde(default)]
    pub schedule: TickSchedule,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub poll: PollPolicy,

    #[serde(default)]
    pub market_making: MarketMakingConfig,

    #[serde(default)]
    pub liquidity_ladder: LiquidityLadderConfig,

    #[serde(default)]
    pub refinery: RefineryConfig,

    #[serde(default)]
    pub pipeline_arbitrage: PipelineArbitrageConfig,
}

impl Config {
    pub const DEFAULT_PATH: &'static str = "strategies.yml";

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;

        Self::from_yaml(&raw).with_context(|| format!("failed to load config {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(raw).context("failed to parse config")?;
        config.validate().context("config validation failed")?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.schedule.validate().context("invalid schedule")?;

        if self.poll.interval_ms == 0 {
            bail!("poll.interval_ms must be > 0");
        }
        if self.poll.timeout_ms < self.poll.interval_ms {
            bail!("poll.timeout_ms must be at least poll.interval_ms");
        }

        self.market_making
            .validate()
            .context("invalid market_making section")?;
        self.liquidity_ladder
            .validate()
            .context("invalid liquidity_ladder section")?;
        self.refinery.validate().context("invalid refinery section")?;
        self.pipeline_arbitrage
            .validate()
            .context("invalid pipeline_arbitrage section")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{instrument_rules::FlattenStyle, tick::Tick, ticker::Ticker};

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_yaml("{}").expect("defaults are valid");

        assert_eq!(config.schedule.window.end, Tick(300));
        assert_eq!(config.refinery.max_cycles, 25);
        assert_eq!(config.pipeline_arbitrage.routes.len(), 2);
        assert!(config.market_making.instruments.is_empty());
    }

    #[test]
    fn parses_instrument_sections() {
        let config = Config::from_yaml(
            r#"
schedule:
  window: { start: 3, end: 295 }
  interval_ms: 100
market_making:
  instruments:
    - { ticker: ALGO, order_quantity: 2000, risk_threshold: 5000 }
    - { ticker: CNR, order_quantity: 2000, risk_threshold: 5000 }
liquidity_ladder:
  ladder: { threshold: 12000 }
  instruments:
    - ticker: RY
      order_quantity: 500
      risk_threshold: 5000
      flatten: { clip_size: 750, style: limit_at_close }
"#,
        )
        .expect("valid config");

        assert_eq!(config.schedule.window.start, Tick(3));
        assert_eq!(config.market_making.instruments.len(), 2);
        assert_eq!(config.liquidity_ladder.ladder.threshold, 12_000.0);

        let ry = &config.liquidity_ladder.instruments[0];
        assert_eq!(ry.ticker, Ticker::from("RY"));
        assert_eq!(ry.flatten.clip_size, 750);
        assert_eq!(ry.flatten.style, FlattenStyle::LimitAtClose);
    }

    #[test]
    fn rejects_duplicate_instruments() {
        let result = Config::from_yaml(
            r#"
market_making:
  instruments:
    - { ticker: ALGO, order_quantity: 2000, risk_threshold: 5000 }
    - { ticker: algo, order_quantity: 1000, risk_threshold: 5000 }
"#,
        );

        assert!(result.is_err());
    }

    #[test]
    fn shipped_config_is_valid() {
        let config = Config::load(Config::DEFAULT_PATH).expect("strategies.yml loads");

        assert_eq!(config.market_making.instruments.len(), 4);
        assert!(
            config
                .market_making
                .instruments
                .iter()
                .all(|rules| rules.risk_threshold == 0)
        );
        assert_eq!(config.liquidity_ladder.instruments.len(), 3);
        assert_eq!(config.refinery.max_cycles, 25);
    }

    #[test]
    fn rejects_inverted_tick_window() {
        let result = Config::from_yaml("schedule:\n  window: { start: 200, end: 100 }\n");

        assert!(result.is_err());
    }
}
