pub mod order_action;
pub mod order_router;
pub mod types;
