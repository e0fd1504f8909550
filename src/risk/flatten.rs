use crate::execution::order_action::{OrderRequest, Side};
use crate::types::{
    instrument_rules::{FlattenStyle, InstrumentRules},
    price::Price,
    quote::Quote,
};

/// Orders that take `position` back to zero, split into clips.
///
/// Every order trades against the position, and the clips sum to exactly
/// `|position|`, so a complete fill can never grow the exposure.
pub fn flatten_orders(
    position: i64,
    rules: &InstrumentRules,
    close: Price,
    quote: Option<Quote>,
) -> Vec<OrderRequest> {
    if position == 0 {
        return Vec::new();
    }

    let side = if position > 0 { Side::Sell } else { Side::Buy };
    let clip = u64::from(rules.flatten.clip_size.max(1));
    let mut remaining = position.unsigned_abs();
    let mut orders = Vec::new();

    while remaining > 0 {
        let size = remaining.min(clip);
        // size <= clip_size, which is a u32
        let quantity = size as u32;
        remaining -= size;

        let order = match (rules.flatten.style, quote) {
            (FlattenStyle::Market, _) | (FlattenStyle::AggressiveLimit, None) => {
                OrderRequest::market(rules.ticker.clone(), side, quantity)
            }
            (FlattenStyle::AggressiveLimit, Some(quote)) => {
                let price = match side {
                    Side::Buy => quote.ask,
                    Side::Sell => quote.bid,
                };
                OrderRequest::limit(rules.ticker.clone(), side, quantity, price)
            }
            (FlattenStyle::LimitAtClose, _) => {
                OrderRequest::limit(rules.ticker.clone(), side, quantity, close)
            }
        };

        orders.push(order);
    }

    orders
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::order_action::OrderType;
    use crate::types::ticker::Ticker;

    fn rules(clip_size: u32, style: FlattenStyle) -> InstrumentRules {
        let mut rules = InstrumentRules::for_ticker(Ticker::from("CNR"), 500, 5000);
        rules.flatten.clip_size = clip_size;
        rules.flatten.style = style;
        rules
    }

    #[test]
    fn short_position_is_bought_back_in_clips() {
        let orders = flatten_orders(-6000, &rules(5000, FlattenStyle::Market), Price::new(7.0), None);

        assert_eq!(orders.len(), 2);
        assert!(orders.iter().all(|order| order.side == Side::Buy));
        assert_eq!(orders.iter().map(|order| order.quantity).sum::<u32>(), 6000);
        assert!(orders.iter().all(|order| order.order_type == OrderType::Market));
    }

    #[test]
    fn flattening_never_increases_exposure() {
        for position in [-12_345_i64, -1, 1, 750, 5_001, 40_000] {
            for style in [
                FlattenStyle::Market,
                FlattenStyle::AggressiveLimit,
                FlattenStyle::LimitAtClose,
            ] {
                let orders = flatten_orders(position, &rules(750, style), Price::new(7.0), None);
                let after = position + orders.iter().map(OrderRequest::signed_quantity).sum::<i64>();

                assert_eq!(after, 0);
                let mut running = position;
                for order in &orders {
                    let next = running + order.signed_quantity();
                    assert!(next.abs() <= running.abs());
                    running = next;
                }
            }
        }
    }

    #[test]
    fn aggressive_limits_cross_the_touch() {
        let quote = Quote {
            bid: Price::new(6.98),
            ask: Price::new(7.02),
        };

        let orders = flatten_orders(5200, &rules(750, FlattenStyle::AggressiveLimit), Price::new(7.0), Some(quote));

        assert_eq!(orders.len(), 7);
        assert!(orders.iter().all(|order| order.side == Side::Sell));
        assert!(orders.iter().all(|order| order.price == Some(Price::new(6.98))));
        assert_eq!(orders.last().map(|order| order.quantity), Some(700));
    }

    #[test]
    fn limit_at_close_uses_last_close() {
        let orders = flatten_orders(-900, &rules(750, FlattenStyle::LimitAtClose), Price::new(7.05), None);

        assert_eq!(orders.len(), 2);
        assert!(orders.iter().all(|order| order.price == Some(Price::new(7.05))));
    }

    #[test]
    fn flat_position_needs_nothing() {
        assert!(flatten_orders(0, &rules(750, FlattenStyle::Market), Price::new(7.0), None).is_empty());
    }
}
