use crate::risk::context::RiskContext;
use crate::risk::decision::RiskReason;
use crate::risk::engine::RiskCheck;

#[derive(Debug, Clone, Default)]
pub struct MarketSanityCheck;

impl MarketSanityCheck {
    pub fn new() -> Self {
        Self
    }
}

impl RiskCheck for MarketSanityCheck {
    fn name(&self) -> &'static str {
        "MarketSanityCheck"
    }

    fn evaluate(&mut self, context: &RiskContext) -> Result<(), Vec<RiskReason>> {
        let Some(quote) = context.snapshot.quote else {
            return Err(vec![RiskReason::MissingMarketData]);
        };

        let bid = quote.bid.as_f64();
        let ask = quote.ask.as_f64();

        if bid > 0.0 && ask > 0.0 && bid < ask {
            Ok(())
        } else {
            Err(vec![RiskReason::CrossedOrInvalidBook])
        }
    }
}
