//! Per-account exchange capability

use std::collections::HashSet;

use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::Result;
use crate::exchange::{MarketInfo, Order, OrderBook, OrderRequest, Ticker};

/// One authenticated connection to a venue.
///
/// Implementations must be safe for concurrent use; the hub hands the same
/// client to every strategy trading on that account.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Venue name, lowercase (e.g. `binance`).
    fn name(&self) -> &str;

    async fn fetch_order_book(&self, pair: &str) -> Result<OrderBook>;

    async fn fetch_ticker(&self, pair: &str) -> Result<Ticker>;

    async fn create_order(&self, request: OrderRequest) -> Result<Order>;

    async fn fetch_order(&self, id: &str, pair: &str) -> Result<Order>;

    async fn cancel_order(&self, id: &str, pair: &str) -> Result<Order>;

    /// Precision rules of a listed pair.
    async fn market(&self, pair: &str) -> Result<MarketInfo>;

    /// All listed pairs, `BASE/QUOTE` form.
    async fn pairs(&self) -> Result<HashSet<String>>;

    /// Truncate an amount to the market's amount precision.
    async fn amount_to_precision(&self, pair: &str, amount: Decimal) -> Result<Decimal> {
        let market = self.market(pair).await?;
        Ok(amount.round_dp_with_strategy(market.amount_precision, RoundingStrategy::ToZero))
    }

    /// Round a price to the market's price precision.
    async fn price_to_precision(&self, pair: &str, price: Decimal) -> Result<Decimal> {
        let market = self.market(pair).await?;
        Ok(price.round_dp_with_strategy(market.price_precision, RoundingStrategy::MidpointNearestEven))
    }
}
