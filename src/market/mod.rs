pub mod market_snapshot;
pub mod order_book;
pub mod security;
pub mod snapshot_reader;
