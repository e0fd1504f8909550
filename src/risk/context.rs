use crate::market::market_snapshot::MarketSnapshot;
use crate::types::instrument_rules::InstrumentRules;

#[derive(Debug)]
pub struct RiskContext<'a> {
    pub rules: &'a InstrumentRules,
    pub snapshot: &'a MarketSnapshot,
}
