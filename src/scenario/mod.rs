pub mod scenario;
pub mod strategies;
pub mod venues;
