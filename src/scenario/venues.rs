use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VenueKind {
    /// Live RIT client REST API.
    Rit,
    /// In-memory simulation, no network.
    #[clap(name = "dry-run")]
    DryRun,
}

impl fmt::Display for VenueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rit => write!(f, "rit"),
            Self::DryRun => write!(f, "dry-run"),
        }
    }
}

impl FromStr for VenueKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rit" => Ok(Self::Rit),
            "dry-run" | "dryrun" | "paper" => Ok(Self::DryRun),
            other => Err(anyhow!("unknown venue kind: {other}")),
        }
    }
}
