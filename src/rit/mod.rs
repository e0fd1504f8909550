pub mod rit_client;
pub mod rit_config;
pub mod rit_models;
pub mod rit_venue;
