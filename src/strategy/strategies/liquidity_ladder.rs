use serde::Deserialize;

use crate::{
    execution::order_action::Side,
    market::market_snapshot::MarketSnapshot,
    signals::signal_state::SignalState,
    strategy::{
        instrument_context::{InstrumentContext, WithContext},
        strategy::Strategy,
        strategy_helpers::StrategyHelpers,
    },
    types::{
        instrument_rules::InstrumentRules,
        quote_target::{NoQuoteReason, QuoteOrder, QuoteTarget},
    },
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LadderAnchor {
    #[default]
    LastClose,
    /// Trailing close average, falling back to the last close before any sample.
    MovingAverage,
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
pub struct LadderLevel {
    pub side: LadderSide,
    /// Added to the anchor price.
    pub offset: f64,
    pub quantity: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LadderSide {
    Buy,
    Sell,
}

impl From<LadderSide> for Side {
    fn from(side: LadderSide) -> Self {
        match side {
            LadderSide::Buy => Side::Buy,
            LadderSide::Sell => Side::Sell,
        }
    }
}

impl LadderLevel {
    fn new(side: LadderSide, offset: f64, quantity: u32) -> Self {
        Self {
            side,
            offset,
            quantity,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LadderConfig {
    /// Ask depth in excess of bid depth above which the sell-heavy ladder is posted.
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    #[serde(default)]
    pub anchor: LadderAnchor,

    #[serde(default = "default_sell_heavy")]
    pub sell_heavy: Vec<LadderLevel>,

    #[serde(default = "default_buy_heavy")]
    pub buy_heavy: Vec<LadderLevel>,
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            anchor: LadderAnchor::default(),
            sell_heavy: default_sell_heavy(),
            buy_heavy: default_buy_heavy(),
        }
    }
}

impl LadderConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.threshold.is_finite() {
            anyhow::bail!("ladder threshold must be finite");
        }
        for level in self.sell_heavy.iter().chain(&self.buy_heavy) {
            if level.quantity == 0 || !level.offset.is_finite() {
                anyhow::bail!("ladder level {level:?} needs a finite offset and a positive quantity");
            }
        }
        Ok(())
    }
}

fn default_threshold() -> f64 {
    15_000.0
}

fn default_sell_heavy() -> Vec<LadderLevel> {
    use LadderSide::{Buy, Sell};

    vec![
        LadderLevel::new(Sell, 0.04, 500),
        LadderLevel::new(Sell, 0.05, 500),
        LadderLevel::new(Buy, -0.05, 750),
        LadderLevel::new(Sell, 0.05, 500),
        LadderLevel::new(Sell, 0.06, 500),
    ]
}

fn default_buy_heavy() -> Vec<LadderLevel> {
    use LadderSide::{Buy, Sell};

    vec![
        LadderLevel::new(Buy, -0.04, 500),
        LadderLevel::new(Buy, -0.05, 500),
        LadderLevel::new(Sell, 0.05, 750),
        LadderLevel::new(Buy, -0.05, 500),
        LadderLevel::new(Buy, -0.06, 500),
    ]
}

/// Posts a ladder of limits around an anchor price every iteration, leaning
/// against whichever side of the book carries more depth.
#[derive(Debug, Clone)]
pub struct LiquidityLadder {
    ctx: InstrumentContext,
    ladder: LadderConfig,
}

impl LiquidityLadder {
    pub fn new(rules: &InstrumentRules, ladder: LadderConfig) -> Self {
        Self {
            ctx: InstrumentContext::new(rules),
            ladder,
        }
    }

    fn anchor(&self, snapshot: &MarketSnapshot, signals: &SignalState) -> f64 {
        match self.ladder.anchor {
            LadderAnchor::LastClose => snapshot.close.as_f64(),
            LadderAnchor::MovingAverage => signals
                .close_average()
                .unwrap_or_else(|| snapshot.close.as_f64()),
        }
    }
}

impl WithContext for LiquidityLadder {
    fn ctx(&self) -> &InstrumentContext {
        &self.ctx
    }
}

impl Strategy for LiquidityLadder {
    fn name(&self) -> &'static str {
        "liquidity-ladder"
    }

    fn compute_target(
        &self,
        snapshot: &MarketSnapshot,
        signals: &SignalState,
    ) -> Result<QuoteTarget, NoQuoteReason> {
        let ask_minus_bid = snapshot.stats.ask_minus_bid_volume();

        let levels = if ask_minus_bid > self.ladder.threshold {
            &self.ladder.sell_heavy
        } else if ask_minus_bid < self.ladder.threshold {
            &self.ladder.buy_heavy
        } else {
            return Err(NoQuoteReason::ImbalanceAtThreshold { ask_minus_bid });
        };

        let anchor = self.anchor(snapshot, signals);

        let orders: Vec<_> = levels
            .iter()
            .filter(|level| level.quantity > 0)
            .map(|level| (level, self.round(anchor + level.offset)))
            .filter(|(_, price)| price.as_f64() > 0.0)
            .map(|(level, price)| match Side::from(level.side) {
                Side::Buy => QuoteOrder::buy(price, level.quantity),
                Side::Sell => QuoteOrder::sell(price, level.quantity),
            })
            .collect();

        if orders.is_empty() {
            return Err(NoQuoteReason::ZeroQuantity);
        }

        Ok(QuoteTarget::new(orders))
    }
}
