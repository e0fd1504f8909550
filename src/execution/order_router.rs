use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    errors::WorkflowError,
    execution::{
        order_action::{OrderAction, OrderId, OrderRequest},
        types::OpenOrder,
    },
    risk::flatten::flatten_orders,
    types::{
        instrument_rules::InstrumentRules,
        quote::Quote,
        quote_target::QuoteTarget,
        ticker::Ticker,
    },
    venue::{
        DynamicVenue,
        poll::PollPolicy,
        retry::RetryPolicy,
        venue_error::{VenueError, VenueResult},
    },
};

/// Order ids to cancel once more than `cap` orders rest: the oldest first,
/// leaving `target` behind.
pub fn oldest_excess(open_orders: &[OpenOrder], cap: usize, target: usize) -> Vec<OrderId> {
    if open_orders.len() <= cap {
        return Vec::new();
    }

    let mut ids: Vec<OrderId> = open_orders.iter().map(|order| order.order_id).collect();
    ids.sort();
    ids.truncate(open_orders.len().saturating_sub(target));
    ids
}

#[derive(Clone)]
pub struct OrderRouter {
    venue: DynamicVenue,
    retry: RetryPolicy,
    poll: PollPolicy,
}

impl OrderRouter {
    pub fn new(venue: DynamicVenue, retry: RetryPolicy, poll: PollPolicy) -> Self {
        Self { venue, retry, poll }
    }

    async fn dispatch(&self, action: &OrderAction) -> VenueResult<Option<OrderId>> {
        match action {
            OrderAction::CancelAll => self.venue.cancel_all().await.map(|_| None),
            OrderAction::Cancel { ticker, order_ids } => self
                .venue
                .cancel_orders(ticker, order_ids)
                .await
                .map(|_| None),
            OrderAction::Place(order) => self.venue.submit_order(order).await.map(Some),
        }
    }

    /// Sends every action once. Non-fatal failures are logged and skipped.
    pub async fn execute(&self, actions: &[OrderAction]) -> VenueResult<Vec<OrderId>> {
        let mut placed = Vec::new();

        for action in actions {
            match self.dispatch(action).await {
                Ok(Some(order_id)) => placed.push(order_id),
                Ok(None) => {}
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => warn!(?action, %error, "order action failed"),
            }
        }

        Ok(placed)
    }

    pub async fn place_target(
        &self,
        ticker: &Ticker,
        target: &QuoteTarget,
    ) -> VenueResult<Vec<OrderId>> {
        let actions: Vec<_> = target
            .orders
            .iter()
            .map(|order| {
                OrderAction::Place(OrderRequest::limit(
                    ticker.clone(),
                    order.side,
                    order.quantity,
                    order.price,
                ))
            })
            .collect();

        self.execute(&actions).await
    }

    /// Cancels the oldest resting orders once the instrument's cap is exceeded.
    pub async fn cancel_excess(
        &self,
        rules: &InstrumentRules,
        open_orders: &[OpenOrder],
    ) -> VenueResult<usize> {
        let excess = oldest_excess(open_orders, rules.max_open_orders, rules.cancel_to);
        if excess.is_empty() {
            return Ok(0);
        }

        info!(
            ticker = %rules.ticker,
            open = open_orders.len(),
            cancelling = excess.len(),
            target = rules.cancel_to,
            "open order cap exceeded"
        );

        self.venue.cancel_orders(&rules.ticker, &excess).await?;

        Ok(excess.len())
    }

    /// Runs `initial` (cancels plus flattening orders) and keeps re-sizing from
    /// the venue's position until it reads flat or the rounds run out.
    /// Submissions here are retried on transient failures.
    pub async fn flatten_until_flat(
        &self,
        rules: &InstrumentRules,
        initial: &[OrderAction],
        shutdown: &CancellationToken,
    ) -> Result<(), WorkflowError> {
        let ticker = &rules.ticker;
        let venue = &self.venue;
        let mut actions = initial.to_vec();

        for round in 1..=rules.flatten.max_rounds {
            info!(%ticker, round, actions = actions.len(), "flattening position");

            for action in &actions {
                let result = self
                    .retry
                    .run("flatten order", || self.dispatch(action))
                    .await;

                match result {
                    Ok(_) => {}
                    Err(error) if error.is_fatal() => return Err(error.into()),
                    Err(error) => warn!(%ticker, ?action, %error, "flatten action failed"),
                }
            }

            let flat = self
                .poll
                .poll_until("flat position", shutdown, move || async move {
                    let security = venue.security(ticker).await?;
                    Ok((security.position == 0).then_some(()))
                })
                .await;

            match flat {
                Ok(()) => {
                    info!(%ticker, round, "position flat");
                    return Ok(());
                }
                Err(VenueError::Timeout { .. }) => {}
                Err(error) => return Err(error.into()),
            }

            if round == rules.flatten.max_rounds {
                break;
            }

            actions = self.next_round(rules).await?;
            if actions.is_empty() {
                return Ok(());
            }
        }

        let position = self
            .retry
            .run("securities", || venue.security(ticker))
            .await?
            .position;

        Err(WorkflowError::FlattenIncomplete {
            ticker: ticker.clone(),
            position,
            rounds: rules.flatten.max_rounds,
        })
    }

    /// Cancels leftovers of the previous round and sizes new orders from the
    /// current position; empty once flat.
    async fn next_round(&self, rules: &InstrumentRules) -> VenueResult<Vec<OrderAction>> {
        let ticker = &rules.ticker;
        let venue = &self.venue;

        let security = self.retry.run("securities", || venue.security(ticker)).await?;
        let open: Vec<OrderId> = self
            .retry
            .run("orders", || venue.open_orders())
            .await?
            .into_iter()
            .filter(|order| order.ticker == *ticker)
            .map(|order| order.order_id)
            .collect();

        let mut actions = Vec::new();
        if !open.is_empty() {
            actions.push(OrderAction::Cancel {
                ticker: ticker.clone(),
                order_ids: open,
            });
        }

        if security.position == 0 {
            if !actions.is_empty() {
                self.execute(&actions).await?;
            }
            return Ok(Vec::new());
        }

        let close = self.retry.run("securities/history", || venue.last_close(ticker)).await?;
        let quote = Quote {
            bid: security.bid,
            ask: security.ask,
        };
        let quote = (!quote.is_crossed() && quote.bid.as_f64() > 0.0).then_some(quote);

        warn!(%ticker, position = security.position, "position not flat yet, re-sizing");

        actions.extend(
            flatten_orders(security.position, rules, close, quote)
                .into_iter()
                .map(OrderAction::Place),
        );

        Ok(actions)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::execution::order_action::{OrderType, Side};
    use crate::execution::types::OrderStatus;
    use crate::types::{instrument_rules::FlattenStyle, price::Price};
    use crate::venue::dry_run::{DryRunVenue, VenueCall};

    fn quick_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            jitter_ms: 0,
        }
    }

    fn quick_poll() -> PollPolicy {
        PollPolicy::new(Duration::from_millis(1), Duration::from_millis(20))
    }

    fn router(venue: Arc<DryRunVenue>) -> OrderRouter {
        OrderRouter::new(venue, quick_retry(), quick_poll())
    }

    fn open_order(id: u64) -> OpenOrder {
        OpenOrder {
            order_id: OrderId(id),
            ticker: Ticker::from("ALGO"),
            side: Side::Buy,
            order_type: OrderType::Limit,
            quantity: 100.0,
            quantity_filled: 0.0,
            price: Some(Price::new(9.9)),
            status: OrderStatus::Open,
        }
    }

    fn submitted(calls: &[VenueCall]) -> Vec<&OrderRequest> {
        calls
            .iter()
            .filter_map(|call| match call {
                VenueCall::Submit(order) => Some(order),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn nothing_cancelled_at_or_below_cap() {
        let orders: Vec<_> = (1..=20).map(open_order).collect();
        assert!(oldest_excess(&orders, 20, 12).is_empty());
    }

    #[test]
    fn excess_cancels_oldest_down_to_target() {
        let orders: Vec<_> = [7, 3, 22, 15, 9, 1, 30, 4, 12, 19, 25, 8, 2, 17, 11, 28, 5, 6, 14, 20, 21]
            .into_iter()
            .map(open_order)
            .collect();

        let cancelled = oldest_excess(&orders, 20, 12);

        assert_eq!(cancelled.len(), 9);
        assert_eq!(
            cancelled,
            [1, 2, 3, 4, 5, 6, 7, 8, 9].map(OrderId).to_vec()
        );
        assert!(orders.len() - cancelled.len() <= 12);
    }

    #[tokio::test]
    async fn cancel_excess_leaves_newest_orders() {
        let mut venue = DryRunVenue::new().with_quote("ALGO", 9.98, 10.02, 10.0);
        for _ in 0..23 {
            venue = venue.with_resting_order("ALGO", Side::Buy, 9.9, 100);
        }
        let venue = Arc::new(venue);
        let rules = InstrumentRules::for_ticker(Ticker::from("ALGO"), 2000, 5000);

        let open = venue.resting_orders().await;
        let cancelled = router(venue.clone())
            .cancel_excess(&rules, &open)
            .await
            .expect("cancelled");

        let remaining = venue.resting_orders().await;
        assert_eq!(cancelled, 11);
        assert_eq!(remaining.len(), 12);
        assert!(remaining.iter().all(|order| order.order_id.0 > 11));
    }

    #[tokio::test]
    async fn quoting_submissions_are_not_retried() {
        let venue = Arc::new(
            DryRunVenue::new()
                .with_quote("ALGO", 9.98, 10.02, 10.0)
                .failing_submissions(1),
        );
        let ticker = Ticker::from("ALGO");
        let actions = vec![
            OrderAction::Place(OrderRequest::limit(ticker.clone(), Side::Buy, 100, Price::new(9.9))),
            OrderAction::Place(OrderRequest::limit(ticker, Side::Sell, 100, Price::new(10.1))),
        ];

        let placed = router(venue.clone()).execute(&actions).await.expect("non-fatal");

        assert_eq!(placed.len(), 1);
        assert_eq!(submitted(&venue.calls().await).len(), 2);
    }

    #[tokio::test]
    async fn flatten_retries_failed_submissions_until_flat() {
        let venue = Arc::new(
            DryRunVenue::new()
                .with_quote("ALGO", 9.98, 10.02, 10.0)
                .with_position("ALGO", -6000)
                .failing_submissions(2),
        );
        let rules = InstrumentRules::for_ticker(Ticker::from("ALGO"), 2000, 5000);
        let initial: Vec<_> = flatten_orders(-6000, &rules, Price::new(10.0), None)
            .into_iter()
            .map(OrderAction::Place)
            .collect();

        router(venue.clone())
            .flatten_until_flat(&rules, &initial, &CancellationToken::new())
            .await
            .expect("flattened");

        assert_eq!(venue.position("ALGO").await, 0);

        let calls = venue.calls().await;
        let orders = submitted(&calls);
        assert_eq!(orders.len(), 4);
        assert!(orders.iter().all(|order| order.side == Side::Buy));
    }

    #[tokio::test]
    async fn unfilled_flatten_reports_incomplete_without_growing_exposure() {
        // a close above the bid leaves every limit-at-close sell resting
        let venue = Arc::new(
            DryRunVenue::new()
                .with_quote("ALGO", 9.98, 10.02, 10.50)
                .with_position("ALGO", 5600),
        );
        let mut rules = InstrumentRules::for_ticker(Ticker::from("ALGO"), 2000, 5000);
        rules.flatten.style = FlattenStyle::LimitAtClose;
        rules.flatten.max_rounds = 2;
        rules.flatten.clip_size = 750;

        let initial: Vec<_> = flatten_orders(5600, &rules, Price::new(10.50), None)
            .into_iter()
            .map(OrderAction::Place)
            .collect();

        let result = router(venue.clone())
            .flatten_until_flat(&rules, &initial, &CancellationToken::new())
            .await;

        match result {
            Err(WorkflowError::FlattenIncomplete { position, rounds, .. }) => {
                assert_eq!(rounds, 2);
                assert_eq!(position, 5600);
            }
            other => panic!("unexpected result {other:?}"),
        }

        let calls = venue.calls().await;
        assert!(submitted(&calls).iter().all(|order| order.side == Side::Sell));
        assert!(calls.iter().any(|call| matches!(call, VenueCall::Cancel { .. })));
    }
}
