pub mod conversion_cycle;
pub mod cycle_state;
pub mod futures_hedge;
pub mod lease_registry;
pub mod pipeline_arbitrage;
pub mod refinery;
