use crate::execution::order_action::OrderAction;

#[derive(Debug, Clone, PartialEq)]
pub enum RiskDecision {
    Approved,
    Hold(RiskHold),
    Rejected(RiskRejection),
}

/// Quoting is skipped this iteration; nothing needs undoing.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskHold {
    pub reasons: Vec<RiskReason>,
}

/// Quoting stops and `required_actions` must run before anything else.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskRejection {
    pub reasons: Vec<RiskReason>,
    pub required_actions: Vec<OrderAction>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RiskReason {
    PositionLimitBreached { position: i64, threshold: i64 },
    MissingMarketData,
    CrossedOrInvalidBook,
}
