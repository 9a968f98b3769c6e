//! VWAP, arbitrage tests, profit/loss and price-source selection

use rust_decimal::Decimal;

use crate::exchange::{OrderBook, OrderSide, Ticker};
use crate::model::PriceSourceType;

/// Direction of an arbitrage between "self" and "other" venues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArbitrageDirection {
    /// Buy on self, sell on other
    BuySelfSellOther,
    /// Sell on self, buy on other
    SellSelfBuyOther,
}

/// Volume-weighted average price for filling `amount` against one side of the book.
///
/// Buys walk the asks, sells walk the bids, in displayed order. Returns zero when
/// the book side has no volume.
pub fn vwap_for_amount(book: &OrderBook, amount: Decimal, side: OrderSide) -> Decimal {
    let levels = match side {
        OrderSide::Buy => &book.asks,
        OrderSide::Sell => &book.bids,
    };

    let mut remaining = amount;
    let mut volume = Decimal::ZERO;
    let mut notional = Decimal::ZERO;

    for level in levels {
        if remaining <= Decimal::ZERO {
            break;
        }
        let used = level.volume.min(remaining);
        if used <= Decimal::ZERO {
            continue;
        }
        notional += level.price * used;
        volume += used;
        remaining -= used;
    }

    if volume.is_zero() {
        Decimal::ZERO
    } else {
        notional / volume
    }
}

/// True when the relative spread between the two VWAPs reaches `min_profitability`.
pub fn arbitrage_opportunity(
    vwap_self: Decimal,
    vwap_other: Decimal,
    min_profitability: Decimal,
    direction: ArbitrageDirection,
) -> bool {
    if vwap_self <= Decimal::ZERO || vwap_other <= Decimal::ZERO {
        return false;
    }
    let margin = match direction {
        ArbitrageDirection::BuySelfSellOther => (vwap_other - vwap_self) / vwap_self,
        ArbitrageDirection::SellSelfBuyOther => (vwap_self - vwap_other) / vwap_other,
    };
    margin >= min_profitability
}

/// Realized profit of buying and selling `amount`, net of both fees.
pub fn profit_loss(
    buy_price: Decimal,
    sell_price: Decimal,
    amount: Decimal,
    buy_fee: Decimal,
    sell_fee: Decimal,
) -> Decimal {
    sell_price * amount - sell_fee - (buy_price * amount + buy_fee)
}

/// Reference price of the requested type.
///
/// `ticker` is only read for [`PriceSourceType::Last`]; callers fetch it lazily.
pub fn price_source(
    book: &OrderBook,
    ticker: Option<&Ticker>,
    source: PriceSourceType,
) -> Option<Decimal> {
    match source {
        PriceSourceType::Mid => book.mid(),
        PriceSourceType::BestBid => book.best_bid(),
        PriceSourceType::BestAsk => book.best_ask(),
        PriceSourceType::Last => ticker.map(|t| t.last),
    }
}
