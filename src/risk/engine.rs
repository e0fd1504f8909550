use std::fmt;

use crate::execution::order_action::OrderAction;
use crate::risk::checks::{market_sanity::MarketSanityCheck, position_limit::PositionLimitCheck};
use crate::risk::context::RiskContext;
use crate::risk::decision::{RiskDecision, RiskHold, RiskReason, RiskRejection};
use crate::risk::flatten::flatten_orders;

pub trait RiskCheck: Send + Sync {
    fn name(&self) -> &'static str;
    fn evaluate(&mut self, context: &RiskContext) -> Result<(), Vec<RiskReason>>;
}

pub struct RiskEngine {
    checks: Vec<Box<dyn RiskCheck>>,
}

impl RiskEngine {
    pub fn new(checks: Vec<Box<dyn RiskCheck>>) -> Self {
        Self { checks }
    }

    /// Runs before any quote is computed. A position breach rejects with the
    /// cancels and flattening orders that must go out first; any other
    /// failure only holds quoting for this iteration.
    pub fn evaluate(&mut self, context: &RiskContext) -> RiskDecision {
        let mut reasons: Vec<RiskReason> = Vec::new();

        for check in &mut self.checks {
            if let Err(mut check_reasons) = check.evaluate(context) {
                tracing::debug!(check = check.name(), reasons = ?check_reasons, "risk check failed");
                reasons.append(&mut check_reasons);
            }
        }

        if reasons.is_empty() {
            return RiskDecision::Approved;
        }

        let breached = reasons
            .iter()
            .any(|reason| matches!(reason, RiskReason::PositionLimitBreached { .. }));

        if !breached {
            return RiskDecision::Hold(RiskHold { reasons });
        }

        let snapshot = context.snapshot;
        let mut required_actions = Vec::new();

        if !snapshot.open_orders.is_empty() {
            required_actions.push(OrderAction::Cancel {
                ticker: snapshot.ticker.clone(),
                order_ids: snapshot.open_orders.iter().map(|order| order.order_id).collect(),
            });
        }

        required_actions.extend(
            flatten_orders(snapshot.position, context.rules, snapshot.close, snapshot.quote)
                .into_iter()
                .map(OrderAction::Place),
        );

        RiskDecision::Rejected(RiskRejection {
            reasons,
            required_actions,
        })
    }
}

impl fmt::Debug for RiskEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RiskEngine")
            .field("checks_count", &self.checks.len())
            .finish()
    }
}

impl Default for RiskEngine {
    fn default() -> Self {
        Self::new(vec![
            Box::new(PositionLimitCheck::new()),
            Box::new(MarketSanityCheck::new()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::order_action::{OrderId, OrderType, Side};
    use crate::execution::types::{OpenOrder, OrderStatus};
    use crate::market::market_snapshot::MarketSnapshot;
    use crate::types::{
        instrument_rules::InstrumentRules, order_book_stats::OrderBookStats, price::Price,
        quote::Quote, tick::Tick, ticker::Ticker,
    };

    fn snapshot(position: i64) -> MarketSnapshot {
        MarketSnapshot {
            ticker: Ticker::from("ALGO"),
            tick: Tick(50),
            close: Price::new(10.0),
            quote: Some(Quote {
                bid: Price::new(9.99),
                ask: Price::new(10.01),
            }),
            stats: OrderBookStats::default(),
            position,
            open_orders: Vec::new(),
        }
    }

    #[test]
    fn within_limits_is_approved() {
        let rules = InstrumentRules::for_ticker(Ticker::from("ALGO"), 2000, 5000);
        let snapshot = snapshot(5000);

        let decision = RiskEngine::default().evaluate(&RiskContext {
            rules: &rules,
            snapshot: &snapshot,
        });

        assert_eq!(decision, RiskDecision::Approved);
    }

    #[test]
    fn breach_cancels_resting_orders_then_flattens() {
        let rules = InstrumentRules::for_ticker(Ticker::from("ALGO"), 2000, 5000);
        let mut snapshot = snapshot(-6000);
        snapshot.open_orders.push(OpenOrder {
            order_id: OrderId(8),
            ticker: Ticker::from("ALGO"),
            side: Side::Sell,
            order_type: OrderType::Limit,
            quantity: 2000.0,
            quantity_filled: 0.0,
            price: Some(Price::new(10.01)),
            status: OrderStatus::Open,
        });

        let RiskDecision::Rejected(rejection) = RiskEngine::default().evaluate(&RiskContext {
            rules: &rules,
            snapshot: &snapshot,
        }) else {
            panic!("expected rejection");
        };

        assert!(matches!(
            rejection.required_actions.first(),
            Some(OrderAction::Cancel { order_ids, .. }) if order_ids == &vec![OrderId(8)]
        ));

        let bought: u32 = rejection
            .required_actions
            .iter()
            .filter_map(|action| match action {
                OrderAction::Place(order) if order.side == Side::Buy => Some(order.quantity),
                _ => None,
            })
            .sum();
        assert!(bought >= 6000);
    }

    #[test]
    fn crossed_book_only_holds() {
        let rules = InstrumentRules::for_ticker(Ticker::from("ALGO"), 2000, 5000);
        let mut snapshot = snapshot(0);
        snapshot.quote = Some(Quote {
            bid: Price::new(10.02),
            ask: Price::new(10.01),
        });

        let decision = RiskEngine::default().evaluate(&RiskContext {
            rules: &rules,
            snapshot: &snapshot,
        });

        assert_eq!(
            decision,
            RiskDecision::Hold(RiskHold {
                reasons: vec![RiskReason::CrossedOrInvalidBook]
            })
        );
    }
}
