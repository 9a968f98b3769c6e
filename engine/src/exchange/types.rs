//! Market data and order types exchanged with venues

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One price level of an order book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub volume: Decimal,
}

/// Order book snapshot, bids descending and asks ascending as displayed by the venue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBook {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl OrderBook {
    /// Build a book from `[price, volume]` pairs.
    pub fn from_levels(bids: &[(Decimal, Decimal)], asks: &[(Decimal, Decimal)]) -> Self {
        let to_levels = |levels: &[(Decimal, Decimal)]| {
            levels
                .iter()
                .map(|&(price, volume)| BookLevel { price, volume })
                .collect()
        };
        Self {
            bids: to_levels(bids),
            asks: to_levels(asks),
        }
    }

    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }

    pub fn mid(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::from(2)),
            _ => None,
        }
    }

    pub fn is_one_sided(&self) -> bool {
        self.bids.is_empty() || self.asks.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticker {
    pub last: Decimal,
}

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        })
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
}

/// Order status as reported by the venue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Closed,
    Canceled,
    Rejected,
}

impl OrderStatus {
    pub fn is_filled(&self) -> bool {
        *self == Self::Closed
    }

    pub fn is_open(&self) -> bool {
        *self == Self::Open
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub cost: Decimal,
    pub currency: String,
}

/// Order as returned by the venue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub pair: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub amount: Decimal,
    pub price: Option<Decimal>,
    pub filled: Decimal,
    pub status: OrderStatus,
    pub fee: Option<Fee>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn fee_cost(&self) -> Decimal {
        self.fee.as_ref().map(|f| f.cost).unwrap_or(Decimal::ZERO)
    }
}

/// Parameters of a new order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub pair: String,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub amount: Decimal,
    pub price: Option<Decimal>,
    pub post_only: bool,
}

impl OrderRequest {
    pub fn limit(pair: impl Into<String>, side: OrderSide, amount: Decimal, price: Decimal) -> Self {
        Self {
            pair: pair.into(),
            order_type: OrderType::Limit,
            side,
            amount,
            price: Some(price),
            post_only: false,
        }
    }

    pub fn post_only(mut self) -> Self {
        self.post_only = true;
        self
    }
}

/// Precision rules of a listed market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketInfo {
    pub pair: String,
    /// Decimal places allowed for amounts
    pub amount_precision: u32,
    /// Decimal places allowed for prices
    pub price_precision: u32,
}

impl MarketInfo {
    /// Smallest price increment of the market.
    pub fn price_tick(&self) -> Decimal {
        Decimal::new(1, self.price_precision)
    }
}
