use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    errors::WorkflowError,
    execution::order_router::OrderRouter,
    market::snapshot_reader::SnapshotReader,
    risk::{context::RiskContext, decision::RiskDecision, engine::RiskEngine},
    scheduling::{
        tick_schedule::{TickSchedule, pause},
        types::ScheduleDecision,
    },
    signals::signal_state::SignalState,
    strategy::strategy::Strategy,
    types::{instrument_rules::InstrumentRules, tick::Tick},
    venue::{DynamicVenue, poll::PollPolicy, retry::RetryPolicy},
};

struct QuotedInstrument {
    rules: InstrumentRules,
    strategy: Box<dyn Strategy>,
    signals: SignalState,
}

/// Tick-driven market-making loop over a list of instruments sharing one
/// strategy type. Each iteration reads every instrument, lets risk flatten
/// first and only then quotes.
pub struct QuotingLoop {
    venue: DynamicVenue,
    reader: SnapshotReader,
    router: OrderRouter,
    engine: RiskEngine,
    instruments: Vec<QuotedInstrument>,
    schedule: TickSchedule,
    shutdown: CancellationToken,
}

impl QuotingLoop {
    pub fn new(
        venue: DynamicVenue,
        retry: RetryPolicy,
        poll: PollPolicy,
        schedule: TickSchedule,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            reader: SnapshotReader::new(venue.clone()),
            router: OrderRouter::new(venue.clone(), retry, poll),
            venue,
            engine: RiskEngine::default(),
            instruments: Vec::new(),
            schedule,
            shutdown,
        }
    }

    pub fn with_instrument(mut self, rules: InstrumentRules, strategy: Box<dyn Strategy>) -> Self {
        self.instruments.push(QuotedInstrument {
            signals: SignalState::for_rules(&rules),
            rules,
            strategy,
        });
        self
    }

    pub async fn run(&mut self) -> Result<(), WorkflowError> {
        info!(
            instruments = self.instruments.len(),
            window = ?self.schedule.window,
            "quoting loop starting"
        );

        // leftovers from an earlier run would count against the caps
        self.venue.cancel_all().await?;

        loop {
            if self.shutdown.is_cancelled() {
                info!("stop requested");
                break;
            }

            let tick = match self.venue.tick().await {
                Ok(tick) => tick,
                Err(error) if error.is_fatal() => return Err(error.into()),
                Err(error) => {
                    warn!(%error, "could not read tick");
                    pause(self.schedule.interval(), &self.shutdown).await;
                    continue;
                }
            };

            match self.schedule.decide(tick) {
                ScheduleDecision::Finished => {
                    info!(%tick, "tick window closed");
                    break;
                }
                ScheduleDecision::Skip(reason) => debug!(?reason, "waiting for tick window"),
                ScheduleDecision::Evaluate => self.iterate(tick).await?,
            }

            pause(self.schedule.interval(), &self.shutdown).await;
        }

        Ok(())
    }

    /// One pass over every instrument. Failures on one instrument are logged
    /// and the rest still run; fatal errors and stops propagate.
    pub async fn iterate(&mut self, tick: Tick) -> Result<(), WorkflowError> {
        let Self {
            reader,
            router,
            engine,
            instruments,
            shutdown,
            ..
        } = self;

        for instrument in instruments.iter_mut() {
            if let Err(error) = quote_instrument(reader, router, engine, instrument, tick, shutdown).await {
                if error.is_fatal() || error.is_cancelled() {
                    return Err(error);
                }
                warn!(ticker = %instrument.rules.ticker, %error, "instrument skipped this iteration");
            }
        }

        Ok(())
    }
}

async fn quote_instrument(
    reader: &SnapshotReader,
    router: &OrderRouter,
    engine: &mut RiskEngine,
    instrument: &mut QuotedInstrument,
    tick: Tick,
    shutdown: &CancellationToken,
) -> Result<(), WorkflowError> {
    let rules = &instrument.rules;
    let snapshot = reader.read(rules, tick).await?;

    instrument.signals.update(&snapshot, rules);

    match engine.evaluate(&RiskContext {
        rules,
        snapshot: &snapshot,
    }) {
        RiskDecision::Approved => {}
        RiskDecision::Hold(hold) => {
            info!(ticker = %rules.ticker, reasons = ?hold.reasons, "holding quotes");
            return Ok(());
        }
        RiskDecision::Rejected(rejection) => {
            warn!(
                ticker = %rules.ticker,
                reasons = ?rejection.reasons,
                required_actions = ?rejection.required_actions,
                "risk rejected quoting"
            );
            return router
                .flatten_until_flat(rules, &rejection.required_actions, shutdown)
                .await;
        }
    }

    router.cancel_excess(rules, &snapshot.open_orders).await?;

    match instrument
        .strategy
        .compute_target(&snapshot, &instrument.signals)
    {
        Ok(target) => {
            let placed = router.place_target(&rules.ticker, &target).await?;
            debug!(
                ticker = %rules.ticker,
                strategy = instrument.strategy.name(),
                placed = placed.len(),
                bias = instrument.signals.bias(),
                "quotes placed"
            );
        }
        Err(reason) => debug!(ticker = %rules.ticker, ?reason, "no quote"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::{
        execution::order_action::{OrderType, Side},
        strategy::strategies::imbalance_mm::ImbalanceMarketMaker,
        types::{tick::TickWindow, ticker::Ticker},
        venue::dry_run::{DryRunVenue, VenueCall},
    };

    fn quoting(dry_run: &Arc<DryRunVenue>, window: TickWindow) -> QuotingLoop {
        quoting_with_threshold(dry_run, window, 5000)
    }

    fn quoting_with_threshold(
        dry_run: &Arc<DryRunVenue>,
        window: TickWindow,
        risk_threshold: i64,
    ) -> QuotingLoop {
        let rules = InstrumentRules::for_ticker(Ticker::from("ALGO"), 2000, risk_threshold);
        let strategy = Box::new(ImbalanceMarketMaker::new(&rules));

        QuotingLoop::new(
            dry_run.clone(),
            RetryPolicy::none(),
            PollPolicy::new(Duration::from_millis(1), Duration::from_millis(200)),
            TickSchedule::new(window, Duration::from_millis(1)),
            CancellationToken::new(),
        )
        .with_instrument(rules, strategy)
    }

    #[tokio::test]
    async fn short_breach_is_bought_back_before_any_quote() {
        let dry_run = Arc::new(DryRunVenue::seeded().with_position("ALGO", -6000));
        let mut quoting = quoting(&dry_run, TickWindow::default());

        quoting.iterate(Tick(10)).await.expect("flattened");
        quoting.iterate(Tick(11)).await.expect("quoted");

        let submits: Vec<_> = dry_run
            .calls()
            .await
            .into_iter()
            .filter_map(|call| match call {
                VenueCall::Submit(order) => Some(order),
                _ => None,
            })
            .collect();

        let first_quote = submits
            .iter()
            .position(|order| order.order_type == OrderType::Limit)
            .expect("quoted once flat");
        let bought: u32 = submits[..first_quote]
            .iter()
            .filter(|order| order.side == Side::Buy)
            .map(|order| order.quantity)
            .sum();

        assert!(bought >= 6000);
        assert_eq!(dry_run.position("ALGO").await, 0);
    }

    #[tokio::test]
    async fn one_legged_fill_is_unwound_when_threshold_is_zero() {
        let dry_run = Arc::new(
            DryRunVenue::seeded()
                .with_position("ALGO", 2000)
                .with_resting_order("ALGO", Side::Sell, 10.10, 2000),
        );
        let mut quoting = quoting_with_threshold(&dry_run, TickWindow::default(), 0);

        quoting.iterate(Tick(10)).await.expect("flattened");

        assert_eq!(dry_run.position("ALGO").await, 0);
        assert!(dry_run.resting_orders().await.is_empty());
        assert!(
            dry_run
                .calls()
                .await
                .iter()
                .any(|call| matches!(call, VenueCall::Cancel { .. }))
        );

        quoting.iterate(Tick(11)).await.expect("quoted");

        let resting = dry_run.resting_orders().await;
        assert_eq!(resting.len(), 2);
        assert!(resting.iter().any(|order| order.side == Side::Buy));
        assert!(resting.iter().any(|order| order.side == Side::Sell));
    }

    #[tokio::test]
    async fn flat_book_gets_a_two_sided_quote() {
        let dry_run = Arc::new(DryRunVenue::seeded());
        let mut quoting = quoting(&dry_run, TickWindow::default());

        quoting.iterate(Tick(10)).await.expect("quoted");

        let resting = dry_run.resting_orders().await;
        assert_eq!(resting.len(), 2);
        assert!(resting.iter().any(|order| order.side == Side::Buy));
        assert!(resting.iter().any(|order| order.side == Side::Sell));
    }

    #[tokio::test]
    async fn run_cancels_leftovers_and_stops_after_window() {
        let dry_run = Arc::new(
            DryRunVenue::seeded()
                .with_resting_order("ALGO", Side::Buy, 9.90, 2000)
                .with_ticks(1, 1),
        );
        let mut quoting = quoting(&dry_run, TickWindow::new(2, 3));

        quoting.run().await.expect("ran to the end of the window");

        let calls = dry_run.calls().await;
        assert_eq!(calls.first(), Some(&VenueCall::CancelAll));
        assert_eq!(calls.iter().filter(|call| **call == VenueCall::Tick).count(), 4);
    }

    #[tokio::test]
    async fn auth_failure_stops_the_loop() {
        let dry_run = Arc::new(DryRunVenue::seeded().rejecting_auth());
        let mut quoting = quoting(&dry_run, TickWindow::default());

        let error = quoting.run().await.expect_err("fatal");

        assert!(error.is_fatal());
    }
}
