use crate::{
    market::market_snapshot::MarketSnapshot,
    strategy::instrument_context::WithContext,
    types::{price::Price, quote::Quote, quote_target::NoQuoteReason},
};

pub trait StrategyHelpers: WithContext {
    fn touch(snapshot: &MarketSnapshot) -> Result<Quote, NoQuoteReason> {
        let quote = snapshot.quote.ok_or(NoQuoteReason::MissingTopOfBook)?;

        if quote.is_crossed() {
            return Err(NoQuoteReason::CrossedBook);
        }

        Ok(quote)
    }

    fn round(&self, price: f64) -> Price {
        self.ctx().rules().round_price_to_tick(price)
    }

    /// Bid and ask for a bias: buy pressure lifts the bid, sell pressure lowers the ask.
    fn cushioned_pair(&self, quote: Quote, bias: f64) -> (Price, Price) {
        if bias >= 0.0 {
            (self.round(quote.bid.cushioned(bias).as_f64()), quote.ask)
        } else {
            (quote.bid, self.round(quote.ask.cushioned(bias).as_f64()))
        }
    }
}

impl<T: WithContext> StrategyHelpers for T {}
