use crate::{
    market::market_snapshot::MarketSnapshot,
    signals::signal_state::SignalState,
    strategy::{
        instrument_context::{InstrumentContext, WithContext},
        strategy::Strategy,
        strategy_helpers::StrategyHelpers,
    },
    types::{
        instrument_rules::InstrumentRules,
        quote_target::{NoQuoteReason, QuoteOrder, QuoteTarget},
    },
};

/// Quotes one bid and one ask at the touch while flat with nothing resting,
/// shading the side the order-book imbalance favours.
#[derive(Debug, Clone)]
pub struct ImbalanceMarketMaker {
    ctx: InstrumentContext,
}

impl ImbalanceMarketMaker {
    pub fn new(rules: &InstrumentRules) -> Self {
        Self {
            ctx: InstrumentContext::new(rules),
        }
    }
}

impl WithContext for ImbalanceMarketMaker {
    fn ctx(&self) -> &InstrumentContext {
        &self.ctx
    }
}

impl Strategy for ImbalanceMarketMaker {
    fn name(&self) -> &'static str {
        "imbalance-mm"
    }

    fn compute_target(
        &self,
        snapshot: &MarketSnapshot,
        signals: &SignalState,
    ) -> Result<QuoteTarget, NoQuoteReason> {
        if !snapshot.is_flat() {
            return Err(NoQuoteReason::PositionNotFlat {
                position: snapshot.position,
            });
        }

        if !snapshot.open_orders.is_empty() {
            return Err(NoQuoteReason::OrdersResting {
                count: snapshot.open_orders.len(),
            });
        }

        let quote = Self::touch(snapshot)?;
        let quantity = self.ctx().order_quantity();
        if quantity == 0 {
            return Err(NoQuoteReason::ZeroQuantity);
        }

        let (bid, ask) = self.cushioned_pair(quote, signals.bias());

        Ok(QuoteTarget::new(vec![
            QuoteOrder::buy(bid, quantity),
            QuoteOrder::sell(ask, quantity),
        ]))
    }
}
