use anyhow::{Result, bail};
use serde::Deserialize;

use crate::types::counterparty::CounterpartyFilter;
use crate::types::price::Price;
use crate::types::ticker::Ticker;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlattenStyle {
    /// Market orders, filled immediately against the book.
    #[default]
    Market,
    /// Limit orders at the opposite touch (buy at the ask, sell at the bid).
    AggressiveLimit,
    /// Limit orders at the last close.
    LimitAtClose,
}

#[derive(Debug, Copy, Clone, Deserialize)]
pub struct FlattenRules {
    /// Largest single flattening order; bigger positions are split into clips.
    #[serde(default = "default_clip_size")]
    pub clip_size: u32,

    #[serde(default)]
    pub style: FlattenStyle,

    /// Submit/confirm rounds before a flatten is declared incomplete.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
}

impl Default for FlattenRules {
    fn default() -> Self {
        Self {
            clip_size: default_clip_size(),
            style: FlattenStyle::default(),
            max_rounds: default_max_rounds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentRules {
    pub ticker: Ticker,

    /// Minimum price increment.
    #[serde(default = "default_price_tick")]
    pub price_tick: f64,

    /// Quantity of every quoted order.
    pub order_quantity: u32,

    /// Absolute position above which quoting stops and the position is flattened.
    pub risk_threshold: i64,

    #[serde(default)]
    pub flatten: FlattenRules,

    /// Open orders above this count trigger cancellation of the oldest ones.
    #[serde(default = "default_max_open_orders")]
    pub max_open_orders: usize,

    /// Open order count left after cancelling the excess.
    #[serde(default = "default_cancel_to")]
    pub cancel_to: usize,

    /// Divisor damping the volume imbalance into a price cushion.
    #[serde(default = "default_reduction_factor")]
    pub reduction_factor: f64,

    /// Book levels requested for depth statistics.
    #[serde(default = "default_book_depth")]
    pub book_depth: u32,

    #[serde(default = "CounterpartyFilter::anonymous")]
    pub counterparty: CounterpartyFilter,

    /// Samples in the trailing close average.
    #[serde(default = "default_average_window")]
    pub average_window: usize,
}

impl InstrumentRules {
    pub fn for_ticker(ticker: Ticker, order_quantity: u32, risk_threshold: i64) -> Self {
        Self {
            ticker,
            price_tick: default_price_tick(),
            order_quantity,
            risk_threshold,
            flatten: FlattenRules::default(),
            max_open_orders: default_max_open_orders(),
            cancel_to: default_cancel_to(),
            reduction_factor: default_reduction_factor(),
            book_depth: default_book_depth(),
            counterparty: CounterpartyFilter::anonymous(),
            average_window: default_average_window(),
        }
    }

    pub fn round_price_to_tick(&self, price: f64) -> Price {
        Price::new(round_to_step(price, self.price_tick).max(0.0))
    }

    pub fn validate(&self) -> Result<()> {
        if self.price_tick <= 0.0 {
            bail!("price_tick must be > 0");
        }
        if self.order_quantity == 0 {
            bail!("order_quantity must be > 0");
        }
        // 0 is allowed: any non-zero position then breaches and is flattened
        if self.risk_threshold < 0 {
            bail!("risk_threshold must be >= 0");
        }
        if self.flatten.clip_size == 0 {
            bail!("flatten.clip_size must be > 0");
        }
        if self.flatten.max_rounds == 0 {
            bail!("flatten.max_rounds must be > 0");
        }
        if self.cancel_to > self.max_open_orders {
            bail!(
                "cancel_to ({}) must not exceed max_open_orders ({})",
                self.cancel_to,
                self.max_open_orders
            );
        }
        // below 1 the sell cushion could push an ask under zero
        if self.reduction_factor < 1.0 || !self.reduction_factor.is_finite() {
            bail!("reduction_factor must be a finite value >= 1");
        }
        if self.book_depth == 0 {
            bail!("book_depth must be > 0");
        }
        if self.average_window == 0 {
            bail!("average_window must be > 0");
        }
        Ok(())
    }
}

fn round_to_step(value: f64, step: f64) -> f64 {
    if step <= 0.0 || !value.is_finite() || !step.is_finite() {
        return value;
    }

    (value / step).round() * step
}

fn default_price_tick() -> f64 {
    0.01
}

fn default_clip_size() -> u32 {
    5_000
}

fn default_max_rounds() -> u32 {
    5
}

fn default_max_open_orders() -> usize {
    20
}

fn default_cancel_to() -> usize {
    12
}

fn default_reduction_factor() -> f64 {
    10.0
}

fn default_book_depth() -> u32 {
    100
}

fn default_average_window() -> usize {
    12
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_price_to_nearest_tick() {
        let rules = InstrumentRules::for_ticker(Ticker::from("ALGO"), 2000, 5000);

        assert!((rules.round_price_to_tick(10.004).as_f64() - 10.0).abs() < 1e-9);
        assert!((rules.round_price_to_tick(10.006).as_f64() - 10.01).abs() < 1e-9);
    }

    #[test]
    fn rejects_cancel_target_above_cap() {
        let mut rules = InstrumentRules::for_ticker(Ticker::from("ALGO"), 2000, 5000);
        rules.cancel_to = 30;

        assert!(rules.validate().is_err());
    }

    #[test]
    fn zero_threshold_is_valid_and_negative_is_not() {
        let mut rules = InstrumentRules::for_ticker(Ticker::from("ALGO"), 2000, 0);
        assert!(rules.validate().is_ok());

        rules.risk_threshold = -1;
        assert!(rules.validate().is_err());
    }

    #[test]
    fn yaml_defaults_fill_optional_fields() {
        let rules: InstrumentRules =
            serde_yaml::from_str("ticker: cnr\norder_quantity: 500\nrisk_threshold: 5000\n")
                .expect("valid rules");

        assert_eq!(rules.ticker.as_str(), "CNR");
        assert_eq!(rules.max_open_orders, 20);
        assert_eq!(rules.cancel_to, 12);
        assert_eq!(rules.counterparty, CounterpartyFilter::anonymous());
        assert_eq!(rules.flatten.style, FlattenStyle::Market);
        assert!(rules.validate().is_ok());
    }
}
