pub mod imbalance_mm;
pub mod liquidity_ladder;
