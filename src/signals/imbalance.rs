use tracing::debug;

use crate::types::order_book_stats::OrderBookStats;

/// `(bid_volume - ask_volume) / ask_volume / reduction_factor`.
///
/// Positive means buyers dominate. An empty ask side or a non-finite result
/// yields a neutral 0.
pub fn volume_imbalance_bias(stats: &OrderBookStats, reduction_factor: f64) -> f64 {
    if stats.ask_volume <= 0.0 || reduction_factor == 0.0 {
        debug!(
            ask_volume = stats.ask_volume,
            reduction_factor, "imbalance neutralised"
        );
        return 0.0;
    }

    let bias = (stats.bid_volume - stats.ask_volume) / stats.ask_volume / reduction_factor;

    if bias.is_finite() { bias } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(bid_volume: f64, ask_volume: f64) -> OrderBookStats {
        OrderBookStats {
            bid_volume,
            ask_volume,
            ..OrderBookStats::default()
        }
    }

    #[test]
    fn buy_pressure_gives_positive_bias() {
        let bias = volume_imbalance_bias(&stats(12_000.0, 8_000.0), 10.0);
        assert!((bias - 0.05).abs() < 1e-12);
    }

    #[test]
    fn sell_pressure_gives_negative_bias() {
        let bias = volume_imbalance_bias(&stats(4_000.0, 8_000.0), 10.0);
        assert!((bias + 0.05).abs() < 1e-12);
    }

    #[test]
    fn empty_ask_side_is_neutral() {
        assert_eq!(volume_imbalance_bias(&stats(5_000.0, 0.0), 10.0), 0.0);
        assert_eq!(volume_imbalance_bias(&stats(0.0, 0.0), 10.0), 0.0);
    }

    #[test]
    fn balanced_book_is_neutral() {
        assert_eq!(volume_imbalance_bias(&stats(7_500.0, 7_500.0), 20.0), 0.0);
    }
}
