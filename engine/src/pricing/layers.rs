//! Layered market-making quote plan

use rust_decimal::Decimal;

use crate::model::AmountChangeType;

/// Which sides may be quoted given the ceiling/floor bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementEligibility {
    pub buy: bool,
    pub sell: bool,
}

impl PlacementEligibility {
    pub fn any(&self) -> bool {
        self.buy || self.sell
    }
}

/// One entry of the layered order plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerOrder {
    pub layer: u32,
    pub amount: Decimal,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub place_buy: bool,
    pub place_sell: bool,
}

/// Inputs of [`build_layered_order_plan`].
#[derive(Debug, Clone)]
pub struct LayerPlanParams {
    pub price_source: Decimal,
    pub bid_spread: Decimal,
    pub ask_spread: Decimal,
    pub base_amount: Decimal,
    pub number_of_layers: u32,
    pub amount_change_type: AmountChangeType,
    pub amount_change_per_layer: Decimal,
    pub ceiling_price: Option<Decimal>,
    pub floor_price: Option<Decimal>,
}

/// Order size for `layer` (1-based). `None` when the size leaves the decimal range.
pub fn adjusted_layer_amount(
    base: Decimal,
    layer: u32,
    mode: AmountChangeType,
    magnitude: Decimal,
) -> Option<Decimal> {
    if layer <= 1 {
        return Some(base);
    }
    let steps = layer - 1;
    match mode {
        AmountChangeType::Fixed => magnitude
            .checked_mul(Decimal::from(steps))
            .and_then(|growth| base.checked_add(growth)),
        AmountChangeType::Percentage => {
            let factor = Decimal::ONE.checked_add(magnitude / Decimal::ONE_HUNDRED)?;
            (0..steps).try_fold(base, |amount, _| amount.checked_mul(factor))
        }
    }
}

/// Buy and sell quote prices of `layer`. `None` when a price leaves the decimal range.
pub fn layer_prices(
    price_source: Decimal,
    bid_spread: Decimal,
    ask_spread: Decimal,
    layer: u32,
) -> Option<(Decimal, Decimal)> {
    let layer = Decimal::from(layer);
    let buy = Decimal::ONE
        .checked_sub(bid_spread.checked_mul(layer)?)?
        .checked_mul(price_source)?;
    let sell = Decimal::ONE
        .checked_add(ask_spread.checked_mul(layer)?)?
        .checked_mul(price_source)?;
    Some((buy, sell))
}

/// Buys are refused above the ceiling, sells below the floor.
pub fn placement_eligibility(
    price_source: Decimal,
    ceiling_price: Option<Decimal>,
    floor_price: Option<Decimal>,
) -> PlacementEligibility {
    PlacementEligibility {
        buy: ceiling_price.map_or(true, |ceiling| price_source <= ceiling),
        sell: floor_price.map_or(true, |floor| price_source >= floor),
    }
}

/// Quote plan for layers `1..=number_of_layers`.
///
/// Eligibility is decided once from the undisplaced price source and applied to
/// every layer. Layers with neither side eligible are left out, and the plan
/// ends at the first layer whose size or prices overflow.
pub fn build_layered_order_plan(params: &LayerPlanParams) -> Vec<LayerOrder> {
    let eligibility =
        placement_eligibility(params.price_source, params.ceiling_price, params.floor_price);
    if !eligibility.any() {
        return Vec::new();
    }

    (1..=params.number_of_layers)
        .map_while(|layer| {
            let amount = adjusted_layer_amount(
                params.base_amount,
                layer,
                params.amount_change_type,
                params.amount_change_per_layer,
            )?;
            let (buy_price, sell_price) =
                layer_prices(params.price_source, params.bid_spread, params.ask_spread, layer)?;
            Some(LayerOrder {
                layer,
                amount,
                buy_price,
                sell_price,
                place_buy: eligibility.buy,
                place_sell: eligibility.sell,
            })
        })
        .collect()
}
