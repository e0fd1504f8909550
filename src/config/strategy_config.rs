use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::strategy::strategies::liquidity_ladder::LadderConfig;
use crate::types::instrument_rules::InstrumentRules;

fn validate_instruments(instruments: &[InstrumentRules]) -> Result<()> {
    for (i, rules) in instruments.iter().enumerate() {
        rules
            .validate()
            .with_context(|| format!("invalid rules for {}", rules.ticker))?;

        if instruments[..i].iter().any(|other| other.ticker == rules.ticker) {
            bail!("{} is configured twice", rules.ticker);
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketMakingConfig {
    #[serde(default)]
    pub instruments: Vec<InstrumentRules>,
}

impl MarketMakingConfig {
    pub fn validate(&self) -> Result<()> {
        validate_instruments(&self.instruments)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LiquidityLadderConfig {
    #[serde(default)]
    pub instruments: Vec<InstrumentRules>,

    #[serde(default)]
    pub ladder: LadderConfig,
}

impl LiquidityLadderConfig {
    pub fn validate(&self) -> Result<()> {
        validate_instruments(&self.instruments)?;
        self.ladder.validate()
    }
}
