//! Price pushing helpers of the volume strategy

use rust_decimal::Decimal;

/// Largest relative deviation applied to the configured trade amount.
pub const AMOUNT_JITTER: Decimal = Decimal::from_parts(5, 0, 0, false, 2);

/// Next maker price.
///
/// The first trade offsets the book mid by `increment_percentage`; later trades
/// push the previous maker price by `price_push_rate` percent.
pub fn next_maker_price(
    mid_price: Decimal,
    previous_maker_price: Option<Decimal>,
    increment_percentage: Decimal,
    price_push_rate: Decimal,
) -> Decimal {
    match previous_maker_price {
        Some(previous) => previous * (Decimal::ONE + price_push_rate / Decimal::ONE_HUNDRED),
        None => mid_price * (Decimal::ONE + increment_percentage / Decimal::ONE_HUNDRED),
    }
}

/// Keep a buy price strictly below the best ask so it never crosses the spread.
pub fn clamp_below_ask(price: Decimal, best_ask: Decimal, tick: Decimal) -> Decimal {
    if price >= best_ask {
        best_ask - tick
    } else {
        price
    }
}

/// Scale `base` by `1 + jitter`, with `jitter` clamped to `±AMOUNT_JITTER`.
pub fn jittered_amount(base: Decimal, jitter: Decimal) -> Decimal {
    let jitter = jitter.max(-AMOUNT_JITTER).min(AMOUNT_JITTER);
    base * (Decimal::ONE + jitter)
}

/// Whether the default account acts as maker for the given trade count.
pub fn default_account_is_maker(trades_executed: u32) -> bool {
    trades_executed % 2 == 0
}
