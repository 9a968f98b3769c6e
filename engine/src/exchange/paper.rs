//! Simulated in-process venue
//!
//! A `PaperVenue` holds order books, tickers and resting orders for one exchange.
//! Each `PaperExchange` is an account on that venue, so orders of the default and
//! additional accounts can trade against each other. Incoming limit orders match
//! resting orders first and then the displayed book; whatever is left rests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::exchange::{
    AccountLabel, ExchangeClient, Fee, MarketInfo, Order, OrderBook, OrderRequest, OrderSide,
    OrderStatus, OrderType, Ticker,
};

/// Venue operations that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaperOp {
    OrderBook,
    Ticker,
    CreateOrder,
    FetchOrder,
    CancelOrder,
}

#[derive(Debug, Clone)]
struct RestingOrder {
    order: Order,
    account: AccountLabel,
}

#[derive(Default)]
struct VenueState {
    markets: HashMap<String, MarketInfo>,
    books: HashMap<String, OrderBook>,
    tickers: HashMap<String, Ticker>,
    orders: HashMap<String, RestingOrder>,
    failures: HashMap<PaperOp, VecDeque<String>>,
    next_id: u64,
}

/// Shared state of one simulated exchange.
pub struct PaperVenue {
    name: String,
    fee_rate: Decimal,
    state: Mutex<VenueState>,
}

impl PaperVenue {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Self::with_fee_rate(name, Decimal::new(1, 3))
    }

    pub fn with_fee_rate(name: impl Into<String>, fee_rate: Decimal) -> Arc<Self> {
        Arc::new(Self {
            name: name.into().to_lowercase(),
            fee_rate,
            state: Mutex::new(VenueState::default()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Client for one account on this venue.
    pub fn account(self: &Arc<Self>, account: AccountLabel) -> Arc<PaperExchange> {
        Arc::new(PaperExchange {
            venue: Arc::clone(self),
            account,
        })
    }

    fn state(&self) -> MutexGuard<'_, VenueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn list_market(&self, pair: &str, amount_precision: u32, price_precision: u32) {
        let pair = pair.to_uppercase();
        self.state().markets.insert(
            pair.clone(),
            MarketInfo {
                pair,
                amount_precision,
                price_precision,
            },
        );
    }

    pub fn set_order_book(&self, pair: &str, book: OrderBook) {
        self.state().books.insert(pair.to_uppercase(), book);
    }

    pub fn set_ticker(&self, pair: &str, last: Decimal) {
        self.state().tickers.insert(pair.to_uppercase(), Ticker { last });
    }

    /// Make the next call of `op` fail with `message`.
    pub fn fail_next(&self, op: PaperOp, message: impl Into<String>) {
        self.state()
            .failures
            .entry(op)
            .or_default()
            .push_back(message.into());
    }

    /// All orders ever placed on the venue, in id order.
    pub fn orders(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self.state().orders.values().map(|r| r.order.clone()).collect();
        orders.sort_by_key(|o| o.id.split('-').last().and_then(|n| n.parse::<u64>().ok()));
        orders
    }

    pub fn open_orders(&self, pair: &str) -> Vec<Order> {
        let pair = pair.to_uppercase();
        self.orders()
            .into_iter()
            .filter(|o| o.pair == pair && o.status.is_open())
            .collect()
    }

    fn take_failure(state: &mut VenueState, op: PaperOp) -> Result<()> {
        match state.failures.get_mut(&op).and_then(|q| q.pop_front()) {
            Some(message) => Err(EngineError::Exchange(message)),
            None => Ok(()),
        }
    }

    fn require_market(&self, state: &VenueState, pair: &str) -> Result<MarketInfo> {
        state.markets.get(pair).cloned().ok_or_else(|| EngineError::UnsupportedPair {
            exchange: self.name.clone(),
            pair: pair.to_string(),
        })
    }

    fn submit(&self, account: AccountLabel, request: OrderRequest) -> Result<Order> {
        let pair = request.pair.to_uppercase();
        let mut state = self.state();
        Self::take_failure(&mut state, PaperOp::CreateOrder)?;
        self.require_market(&state, &pair)?;

        if request.amount <= Decimal::ZERO {
            return Err(EngineError::Exchange(format!("invalid order amount {}", request.amount)));
        }
        let limit = match (request.order_type, request.price) {
            (OrderType::Limit, Some(price)) if price > Decimal::ZERO => Some(price),
            (OrderType::Limit, _) => {
                return Err(EngineError::Exchange("limit order requires a positive price".to_string()))
            }
            (OrderType::Market, _) => None,
        };

        let crosses = |price: Decimal| match (request.side, limit) {
            (_, None) => true,
            (OrderSide::Buy, Some(limit)) => price <= limit,
            (OrderSide::Sell, Some(limit)) => price >= limit,
        };

        // Resting orders on the other side, best price first.
        let mut makers: Vec<(String, Decimal)> = state
            .orders
            .values()
            .filter(|r| r.order.status.is_open() && r.order.side == request.side.opposite())
            .filter_map(|r| r.order.price.map(|p| (r.order.id.clone(), p)))
            .filter(|(_, p)| crosses(*p))
            .collect();
        makers.sort_by(|a, b| match request.side {
            OrderSide::Buy => a.1.cmp(&b.1),
            OrderSide::Sell => b.1.cmp(&a.1),
        });

        let book_levels: Vec<(Decimal, Decimal)> = {
            let book = state.books.get(&pair).cloned().unwrap_or_default();
            let levels = match request.side {
                OrderSide::Buy => book.asks,
                OrderSide::Sell => book.bids,
            };
            levels
                .into_iter()
                .filter(|l| crosses(l.price))
                .map(|l| (l.price, l.volume))
                .collect()
        };

        if request.post_only && (!makers.is_empty() || !book_levels.is_empty()) {
            return Err(EngineError::Exchange(format!(
                "post-only {} order on {} would take liquidity",
                request.side, pair
            )));
        }

        let mut remaining = request.amount;
        let mut filled = Decimal::ZERO;
        let mut notional = Decimal::ZERO;

        for (maker_id, price) in makers {
            if remaining.is_zero() {
                break;
            }
            if let Some(maker) = state.orders.get_mut(&maker_id) {
                let available = maker.order.amount - maker.order.filled;
                let used = available.min(remaining);
                maker.order.filled += used;
                if maker.order.filled >= maker.order.amount {
                    maker.order.status = OrderStatus::Closed;
                }
                let maker_fee = self.fee_rate * used * price;
                let fee = maker.order.fee.get_or_insert(Fee {
                    cost: Decimal::ZERO,
                    currency: quote_currency(&pair),
                });
                fee.cost += maker_fee;
                remaining -= used;
                filled += used;
                notional += used * price;
            }
        }

        for (price, volume) in book_levels {
            if remaining.is_zero() {
                break;
            }
            let used = volume.min(remaining);
            remaining -= used;
            filled += used;
            notional += used * price;
        }

        state.next_id += 1;
        let id = format!("{}-{}", self.name, state.next_id);
        let status = if remaining.is_zero() {
            OrderStatus::Closed
        } else if limit.is_some() {
            OrderStatus::Open
        } else {
            OrderStatus::Canceled
        };
        let average = if filled.is_zero() { None } else { Some(notional / filled) };
        let order = Order {
            id: id.clone(),
            pair: pair.clone(),
            side: request.side,
            order_type: request.order_type,
            amount: request.amount,
            price: limit.or(average),
            filled,
            status,
            fee: Some(Fee {
                cost: self.fee_rate * notional,
                currency: quote_currency(&pair),
            }),
            created_at: Utc::now(),
        };
        debug!(
            "Paper {} {} {} {} @ {:?} -> {:?} (filled {})",
            self.name, account, order.side, order.amount, order.price, order.status, order.filled
        );
        state.orders.insert(id, RestingOrder { order: order.clone(), account });
        Ok(order)
    }
}

fn quote_currency(pair: &str) -> String {
    pair.split_once('/')
        .map(|(_, quote)| quote.to_string())
        .unwrap_or_default()
}

/// One account on a [`PaperVenue`].
pub struct PaperExchange {
    venue: Arc<PaperVenue>,
    account: AccountLabel,
}

impl PaperExchange {
    pub fn venue(&self) -> &Arc<PaperVenue> {
        &self.venue
    }

    pub fn account_label(&self) -> AccountLabel {
        self.account
    }
}

#[async_trait]
impl ExchangeClient for PaperExchange {
    fn name(&self) -> &str {
        self.venue.name()
    }

    async fn fetch_order_book(&self, pair: &str) -> Result<OrderBook> {
        let pair = pair.to_uppercase();
        let mut state = self.venue.state();
        PaperVenue::take_failure(&mut state, PaperOp::OrderBook)?;
        self.venue.require_market(&state, &pair)?;
        Ok(state.books.get(&pair).cloned().unwrap_or_default())
    }

    async fn fetch_ticker(&self, pair: &str) -> Result<Ticker> {
        let pair = pair.to_uppercase();
        let mut state = self.venue.state();
        PaperVenue::take_failure(&mut state, PaperOp::Ticker)?;
        self.venue.require_market(&state, &pair)?;
        state
            .tickers
            .get(&pair)
            .copied()
            .ok_or_else(|| EngineError::Exchange(format!("no ticker for {} on {}", pair, self.venue.name)))
    }

    async fn create_order(&self, request: OrderRequest) -> Result<Order> {
        self.venue.submit(self.account, request)
    }

    async fn fetch_order(&self, id: &str, _pair: &str) -> Result<Order> {
        let mut state = self.venue.state();
        PaperVenue::take_failure(&mut state, PaperOp::FetchOrder)?;
        state
            .orders
            .get(id)
            .filter(|r| r.account == self.account)
            .map(|r| r.order.clone())
            .ok_or_else(|| EngineError::Exchange(format!("order {} not found", id)))
    }

    async fn cancel_order(&self, id: &str, _pair: &str) -> Result<Order> {
        let mut state = self.venue.state();
        PaperVenue::take_failure(&mut state, PaperOp::CancelOrder)?;
        let resting = state
            .orders
            .get_mut(id)
            .filter(|r| r.account == self.account)
            .ok_or_else(|| EngineError::Exchange(format!("order {} not found", id)))?;
        if resting.order.status.is_open() {
            resting.order.status = OrderStatus::Canceled;
        }
        Ok(resting.order.clone())
    }

    async fn market(&self, pair: &str) -> Result<MarketInfo> {
        let state = self.venue.state();
        self.venue.require_market(&state, &pair.to_uppercase())
    }

    async fn pairs(&self) -> Result<HashSet<String>> {
        Ok(self.venue.state().markets.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn venue() -> Arc<PaperVenue> {
        let venue = PaperVenue::new("binance");
        venue.list_market("BTC/USDT", 4, 2);
        venue.set_order_book(
            "BTC/USDT",
            OrderBook::from_levels(&[(dec!(99), dec!(1))], &[(dec!(101), dec!(1))]),
        );
        venue
    }

    #[tokio::test]
    async fn test_resting_order_fills_against_other_account() {
        let venue = venue();
        let maker = venue.account(AccountLabel::Default);
        let taker = venue.account(AccountLabel::Additional);

        let buy = maker
            .create_order(OrderRequest::limit("BTC/USDT", OrderSide::Buy, dec!(0.5), dec!(100)).post_only())
            .await
            .unwrap();
        assert_eq!(buy.status, OrderStatus::Open);

        let sell = taker
            .create_order(OrderRequest::limit("BTC/USDT", OrderSide::Sell, dec!(0.5), dec!(100)))
            .await
            .unwrap();
        assert_eq!(sell.status, OrderStatus::Closed);

        let buy = maker.fetch_order(&buy.id, "BTC/USDT").await.unwrap();
        assert!(buy.status.is_filled());
    }

    #[tokio::test]
    async fn test_post_only_rejected_when_crossing() {
        let venue = venue();
        let client = venue.account(AccountLabel::Default);
        let result = client
            .create_order(OrderRequest::limit("BTC/USDT", OrderSide::Buy, dec!(0.5), dec!(101)).post_only())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_precision_and_injected_failure() {
        let venue = venue();
        let client = venue.account(AccountLabel::Default);
        assert_eq!(client.amount_to_precision("BTC/USDT", dec!(0.123456)).await.unwrap(), dec!(0.1234));
        assert_eq!(client.price_to_precision("BTC/USDT", dec!(100.456)).await.unwrap(), dec!(100.46));

        venue.fail_next(PaperOp::OrderBook, "rate limited");
        let err = client.fetch_order_book("BTC/USDT").await.unwrap_err();
        assert_eq!(err.to_string(), "exchange error: rate limited");
        assert!(client.fetch_order_book("BTC/USDT").await.is_ok());
    }
}
