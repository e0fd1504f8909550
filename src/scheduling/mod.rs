pub mod tick_schedule;
pub mod types;
