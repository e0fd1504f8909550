use tracing::debug;

use crate::{
    market::{market_snapshot::MarketSnapshot, order_book::OrderBook, security::Security},
    types::{
        instrument_rules::InstrumentRules, order_book_stats::OrderBookStats, quote::Quote,
        tick::Tick,
    },
    venue::{DynamicVenue, venue_error::VenueResult},
};

#[derive(Clone)]
pub struct SnapshotReader {
    venue: DynamicVenue,
}

impl SnapshotReader {
    pub fn new(venue: DynamicVenue) -> Self {
        Self { venue }
    }

    /// Close, touch, filtered depth, position and our open orders for one instrument.
    pub async fn read(&self, rules: &InstrumentRules, tick: Tick) -> VenueResult<MarketSnapshot> {
        let ticker = &rules.ticker;

        let close = self.venue.last_close(ticker).await?;
        let book = self.venue.order_book(ticker, rules.book_depth).await?;
        let security = self.venue.security(ticker).await?;

        let mut open_orders: Vec<_> = self
            .venue
            .open_orders()
            .await?
            .into_iter()
            .filter(|order| order.ticker == *ticker)
            .collect();
        open_orders.sort_by_key(|order| order.order_id);

        let stats = OrderBookStats::from_book(&book, &rules.counterparty);

        let snapshot = MarketSnapshot {
            ticker: ticker.clone(),
            tick,
            close,
            quote: touch(&book, &security),
            stats,
            position: security.position,
            open_orders,
        };

        debug!(
            %ticker,
            %tick,
            %close,
            position = snapshot.position,
            bid_volume = stats.bid_volume,
            ask_volume = stats.ask_volume,
            open_orders = snapshot.open_orders.len(),
            "market snapshot"
        );

        Ok(snapshot)
    }
}

/// Book touch, falling back to the security's quoted bid/ask when a side is empty.
fn touch(book: &OrderBook, security: &Security) -> Option<Quote> {
    book.quote().or_else(|| {
        (security.bid.as_f64() > 0.0 && security.ask.as_f64() > 0.0).then_some(Quote {
            bid: security.bid,
            ask: security.ask,
        })
    })
}
