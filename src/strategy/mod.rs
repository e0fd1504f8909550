pub mod instrument_context;
pub mod strategies;
pub mod strategy;
pub mod strategy_helpers;
