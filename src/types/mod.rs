pub mod counterparty;
pub mod instrument_rules;
pub mod lease;
pub mod order_book_stats;
pub mod price;
pub mod quote;
pub mod quote_target;
pub mod tick;
pub mod ticker;
