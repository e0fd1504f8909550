use crate::market::market_snapshot::MarketSnapshot;
use crate::signals::{imbalance::volume_imbalance_bias, moving_average::MovingAverage};
use crate::types::{instrument_rules::InstrumentRules, tick::Tick};

/// Per-instrument signals carried across loop iterations.
#[derive(Debug, Clone)]
pub struct SignalState {
    bias: f64,
    close_average: MovingAverage,
    last_sampled_tick: Option<Tick>,
}

impl SignalState {
    pub fn new(average_window: usize) -> Self {
        Self {
            bias: 0.0,
            close_average: MovingAverage::new(average_window),
            last_sampled_tick: None,
        }
    }

    pub fn for_rules(rules: &InstrumentRules) -> Self {
        Self::new(rules.average_window)
    }

    /// Recomputes the bias every call; the close average takes one sample per tick.
    pub fn update(&mut self, snapshot: &MarketSnapshot, rules: &InstrumentRules) {
        self.bias = volume_imbalance_bias(&snapshot.stats, rules.reduction_factor);

        if self.last_sampled_tick != Some(snapshot.tick) {
            self.close_average.push(snapshot.close.as_f64());
            self.last_sampled_tick = Some(snapshot.tick);
        }
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn close_average(&self) -> Option<f64> {
        self.close_average.value()
    }
}
