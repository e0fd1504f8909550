pub mod imbalance;
pub mod moving_average;
pub mod signal_state;
