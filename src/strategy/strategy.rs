use crate::{
    market::market_snapshot::MarketSnapshot,
    signals::signal_state::SignalState,
    strategy::instrument_context::WithContext,
    types::quote_target::{NoQuoteReason, QuoteTarget},
};

pub trait Strategy: WithContext + Send + Sync {
    fn name(&self) -> &'static str;

    fn compute_target(
        &self,
        snapshot: &MarketSnapshot,
        signals: &SignalState,
    ) -> Result<QuoteTarget, NoQuoteReason>;
}
