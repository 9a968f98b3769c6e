//! Random-walk market data for the paper venues

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rust_decimal::Decimal;
use strategy_engine::prelude::*;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

const BOOK_DEPTH: i64 = 5;

/// Publishes a five-level book and a last price per venue and pair.
///
/// Each venue walks independently so cross-venue spreads open and close over time.
pub struct PaperMarketFeed {
    venues: Vec<Arc<PaperVenue>>,
    pairs: Vec<String>,
    prices: HashMap<(String, String), Decimal>,
}

impl PaperMarketFeed {
    pub fn new(venues: Vec<Arc<PaperVenue>>, pairs: Vec<String>, start_price: Decimal) -> Self {
        let prices = venues
            .iter()
            .flat_map(|venue| {
                pairs
                    .iter()
                    .map(move |pair| ((venue.name().to_string(), pair.clone()), start_price))
            })
            .collect();
        Self {
            venues,
            pairs,
            prices,
        }
    }

    /// Move every price by up to 10 bps and republish.
    pub fn step(&mut self) {
        let mut rng = rand::thread_rng();
        for venue in &self.venues {
            for pair in &self.pairs {
                let key = (venue.name().to_string(), pair.clone());
                let Some(price) = self.prices.get_mut(&key) else {
                    continue;
                };
                let bps: i64 = rng.gen_range(-10..=10);
                *price = (*price * (Decimal::ONE + Decimal::new(bps, 4))).round_dp(2);
                venue.set_order_book(pair, book_around(*price));
                venue.set_ticker(pair, *price);
                debug!("Paper {} {} -> {}", venue.name(), pair, price);
            }
        }
    }

    pub async fn run(mut self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("📡 Paper market feed started for {} venues", self.venues.len());

        loop {
            tokio::select! {
                _ = ticker.tick() => self.step(),
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Paper market feed stopped");
    }
}

/// Levels one cent apart on both sides of `price`, ten units each.
fn book_around(price: Decimal) -> OrderBook {
    let tick = Decimal::new(1, 2);
    let volume = Decimal::TEN;
    let bids: Vec<(Decimal, Decimal)> = (1..=BOOK_DEPTH)
        .map(|i| (price - tick * Decimal::from(i), volume))
        .collect();
    let asks: Vec<(Decimal, Decimal)> = (1..=BOOK_DEPTH)
        .map(|i| (price + tick * Decimal::from(i), volume))
        .collect();
    OrderBook::from_levels(&bids, &asks)
}
