mod config;
mod conversion;
mod errors;
mod execution;
mod market;
mod risk;
mod rit;
mod runner;
mod scenario;
mod scheduling;
mod signals;
mod strategy;
mod types;
mod venue;

use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::scenario::scenario::Scenario;
use crate::scenario::strategies::StrategyKind;
use crate::scenario::venues::VenueKind;

#[derive(Debug, Clone, Parser)]
struct Args {
    #[arg(long, value_enum, default_value = "dry-run")]
    pub venue: VenueKind,

    #[arg(long, value_enum, default_value = "basic-mm")]
    pub strategy: StrategyKind,

    #[arg(long, default_value = Config::DEFAULT_PATH)]
    pub config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("rit_trader=debug".parse()?)
                .add_directive("venue=info".parse()?),
        )
        .with_target(false)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();
    let config = Config::load(&args.config)?;

    let venue = Scenario::venue(args.venue, &config)?;

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    warn!("interrupt received, stopping at the next loop boundary");
                    shutdown.cancel();
                }
                Err(error) => error!(%error, "could not listen for interrupts"),
            }
        }
    });

    info!(strategy = %args.strategy, venue = %args.venue, config = %args.config, "starting");

    if let Err(error) = Scenario::run(args.strategy, venue, &config, shutdown).await {
        error!("{error:#}");
        return Err(error);
    }

    info!("finished");
    Ok(())
}
