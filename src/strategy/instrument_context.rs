use crate::types::instrument_rules::InstrumentRules;

#[derive(Debug, Clone)]
pub struct InstrumentContext {
    pub rules: InstrumentRules,
}

impl InstrumentContext {
    pub fn new(rules: &InstrumentRules) -> Self {
        Self {
            rules: rules.clone(),
        }
    }

    pub fn order_quantity(&self) -> u32 {
        self.rules.order_quantity
    }

    pub fn rules(&self) -> &InstrumentRules {
        &self.rules
    }
}

pub trait WithContext {
    fn ctx(&self) -> &InstrumentContext;
}
