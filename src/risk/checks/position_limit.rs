use crate::risk::context::RiskContext;
use crate::risk::decision::RiskReason;
use crate::risk::engine::RiskCheck;

/// Fails once the absolute position exceeds the instrument's risk threshold.
#[derive(Debug, Clone, Default)]
pub struct PositionLimitCheck;

impl PositionLimitCheck {
    pub fn new() -> Self {
        Self
    }
}

impl RiskCheck for PositionLimitCheck {
    fn name(&self) -> &'static str {
        "PositionLimitCheck"
    }

    fn evaluate(&mut self, context: &RiskContext) -> Result<(), Vec<RiskReason>> {
        let position = context.snapshot.position;
        let threshold = context.rules.risk_threshold;

        if position.abs() > threshold {
            return Err(vec![RiskReason::PositionLimitBreached {
                position,
                threshold,
            }]);
        }

        Ok(())
    }
}
