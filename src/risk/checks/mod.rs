pub mod market_sanity;
pub mod position_limit;
