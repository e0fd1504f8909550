use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyKind {
    /// Imbalance-cushioned two-sided quotes while flat.
    #[clap(name = "basic-mm")]
    BasicMarketMaker,
    /// Depth-driven limit ladder around the last close.
    #[clap(name = "liquidity-mm")]
    LiquidityMarketMaker,
    #[clap(name = "refinery")]
    Refinery,
    #[clap(name = "pipeline-arb")]
    PipelineArbitrage,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BasicMarketMaker => write!(f, "basic-mm"),
            Self::LiquidityMarketMaker => write!(f, "liquidity-mm"),
            Self::Refinery => write!(f, "refinery"),
            Self::PipelineArbitrage => write!(f, "pipeline-arb"),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "basic-mm" => Ok(Self::BasicMarketMaker),
            "liquidity-mm" | "ladder" => Ok(Self::LiquidityMarketMaker),
            "refinery" => Ok(Self::Refinery),
            "pipeline-arb" | "pipeline" => Ok(Self::PipelineArbitrage),
            other => Err(anyhow!("unknown strategy kind: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_display() {
        for kind in StrategyKind::value_variants() {
            assert_eq!(kind.to_string().parse::<StrategyKind>().expect("known"), *kind);
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        assert!("mean-reversion".parse::<StrategyKind>().is_err());
    }
}
