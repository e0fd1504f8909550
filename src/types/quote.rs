use crate::types::price::Price;

/// Best bid and ask of an instrument at the current tick.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Quote {
    pub bid: Price,
    pub ask: Price,
}

impl Quote {
    pub fn is_crossed(&self) -> bool {
        self.bid.as_f64() >= self.ask.as_f64()
    }
}
