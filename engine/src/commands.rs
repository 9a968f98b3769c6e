//! Create requests as received from callers, and the validated commands built from them

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::exchange::normalize_pair;
use crate::model::{format_pair, AmountChangeType, PriceSourceType, StrategyKey, StrategyKind};

const DEFAULT_CHECK_INTERVAL_SECONDS: u32 = 10;

/// Validated parameters for a new arbitrage strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct ArbitrageCommand {
    pub user_id: String,
    pub client_id: String,
    pub side_a: String,
    pub side_b: String,
    pub exchange_a_name: String,
    pub exchange_b_name: String,
    pub amount_to_trade: Decimal,
    pub min_profitability: Decimal,
    pub check_interval_seconds: u32,
    pub max_open_orders: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketMakingCommand {
    pub user_id: String,
    pub client_id: String,
    pub side_a: String,
    pub side_b: String,
    pub exchange_name: String,
    pub oracle_exchange_name: Option<String>,
    pub bid_spread: Decimal,
    pub ask_spread: Decimal,
    pub order_amount: Decimal,
    pub number_of_layers: u32,
    pub amount_change_type: AmountChangeType,
    pub amount_change_per_layer: Decimal,
    pub price_source_type: PriceSourceType,
    pub ceiling_price: Option<Decimal>,
    pub floor_price: Option<Decimal>,
    pub check_interval_seconds: u32,
    pub max_open_orders: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeCommand {
    pub user_id: String,
    pub client_id: String,
    pub side_a: String,
    pub side_b: String,
    pub exchange_name: String,
    pub increment_percentage: Decimal,
    pub price_push_rate: Decimal,
    pub amount_to_trade: Decimal,
    pub num_total_trades: u32,
    pub check_interval_seconds: u32,
}

/// Something that identifies the strategy it creates.
pub trait StrategyCommand: Clone + Send + Sync + 'static {
    const KIND: StrategyKind;

    fn user_id(&self) -> &str;
    fn client_id(&self) -> &str;

    fn key(&self) -> StrategyKey {
        StrategyKey::new(Self::KIND, self.user_id(), self.client_id())
    }
}

macro_rules! impl_strategy_command {
    ($command:ty, $kind:expr) => {
        impl StrategyCommand for $command {
            const KIND: StrategyKind = $kind;

            fn user_id(&self) -> &str {
                &self.user_id
            }

            fn client_id(&self) -> &str {
                &self.client_id
            }
        }
    };
}

impl_strategy_command!(ArbitrageCommand, StrategyKind::Arbitrage);
impl_strategy_command!(MarketMakingCommand, StrategyKind::MarketMaking);
impl_strategy_command!(VolumeCommand, StrategyKind::Volume);

impl ArbitrageCommand {
    pub fn pair(&self) -> String {
        format_pair(&self.side_a, &self.side_b)
    }
}

impl MarketMakingCommand {
    pub fn pair(&self) -> String {
        format_pair(&self.side_a, &self.side_b)
    }
}

impl VolumeCommand {
    pub fn pair(&self) -> String {
        format_pair(&self.side_a, &self.side_b)
    }
}

/// Arbitrage create request. Decimal fields travel as strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArbitrageRequest {
    pub user_id: String,
    pub client_id: String,
    pub pair: String,
    pub exchange_a_name: String,
    pub exchange_b_name: String,
    pub amount_to_trade: String,
    pub min_profitability: String,
    pub check_interval_seconds: Option<u32>,
    pub max_open_orders: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketMakingRequest {
    pub user_id: String,
    pub client_id: String,
    pub pair: String,
    pub exchange_name: String,
    pub oracle_exchange_name: Option<String>,
    pub bid_spread: String,
    pub ask_spread: String,
    pub order_amount: String,
    pub number_of_layers: Option<u32>,
    pub amount_change_type: Option<String>,
    pub amount_change_per_layer: Option<String>,
    pub price_source_type: Option<String>,
    pub ceiling_price: Option<String>,
    pub floor_price: Option<String>,
    pub check_interval_seconds: Option<u32>,
    pub max_open_orders: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeRequest {
    pub user_id: String,
    pub client_id: String,
    pub pair: String,
    pub exchange_name: String,
    pub increment_percentage: String,
    pub price_push_rate: String,
    pub amount_to_trade: String,
    pub num_total_trades: u32,
    pub check_interval_seconds: Option<u32>,
}

/// Any create request, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StrategyRequest {
    Arbitrage(ArbitrageRequest),
    MarketMaking(MarketMakingRequest),
    Volume(VolumeRequest),
}

/// Upper bound on market-making quote layers.
pub const MAX_LAYERS: u32 = 100;

/// Split `BASE/QUOTE` (optionally `BASE/QUOTE:SETTLE`) into its legs.
pub fn split_pair(pair: &str) -> Result<(String, String)> {
    let spot = normalize_pair(pair);
    match spot.split_once('/') {
        Some((base, quote)) if !base.is_empty() && !quote.is_empty() => {
            Ok((base.to_string(), quote.to_string()))
        }
        _ => Err(EngineError::InvalidCommand(format!("malformed pair {}", pair))),
    }
}

fn decimal(field: &str, value: &str) -> Result<Decimal> {
    Decimal::from_str(value.trim())
        .map_err(|e| EngineError::InvalidCommand(format!("{} must be a decimal: {}", field, e)))
}

fn optional_decimal(field: &str, value: Option<&str>) -> Result<Option<Decimal>> {
    value.map(|v| decimal(field, v)).transpose()
}

fn positive(field: &str, value: Decimal) -> Result<Decimal> {
    if value <= Decimal::ZERO {
        return Err(EngineError::InvalidCommand(format!("{} must be positive", field)));
    }
    Ok(value)
}

fn non_negative(field: &str, value: Decimal) -> Result<Decimal> {
    if value < Decimal::ZERO {
        return Err(EngineError::InvalidCommand(format!("{} must not be negative", field)));
    }
    Ok(value)
}

fn interval(value: Option<u32>) -> Result<u32> {
    match value.unwrap_or(DEFAULT_CHECK_INTERVAL_SECONDS) {
        0 => Err(EngineError::InvalidCommand("checkIntervalSeconds must be positive".to_string())),
        seconds => Ok(seconds),
    }
}

fn required(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(EngineError::InvalidCommand(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

impl TryFrom<ArbitrageRequest> for ArbitrageCommand {
    type Error = EngineError;

    fn try_from(request: ArbitrageRequest) -> Result<Self> {
        let (side_a, side_b) = split_pair(&request.pair)?;
        let exchange_a_name = required("exchangeAName", &request.exchange_a_name)?.to_lowercase();
        let exchange_b_name = required("exchangeBName", &request.exchange_b_name)?.to_lowercase();
        if exchange_a_name == exchange_b_name {
            return Err(EngineError::InvalidCommand(
                "arbitrage needs two different exchanges".to_string(),
            ));
        }
        Ok(Self {
            user_id: required("userId", &request.user_id)?,
            client_id: required("clientId", &request.client_id)?,
            side_a,
            side_b,
            exchange_a_name,
            exchange_b_name,
            amount_to_trade: positive("amountToTrade", decimal("amountToTrade", &request.amount_to_trade)?)?,
            min_profitability: non_negative(
                "minProfitability",
                decimal("minProfitability", &request.min_profitability)?,
            )?,
            check_interval_seconds: interval(request.check_interval_seconds)?,
            max_open_orders: request.max_open_orders,
        })
    }
}

impl TryFrom<MarketMakingRequest> for MarketMakingCommand {
    type Error = EngineError;

    fn try_from(request: MarketMakingRequest) -> Result<Self> {
        let (side_a, side_b) = split_pair(&request.pair)?;
        let number_of_layers = request.number_of_layers.unwrap_or(1);
        if number_of_layers == 0 {
            return Err(EngineError::InvalidCommand("numberOfLayers must be at least 1".to_string()));
        }
        if number_of_layers > MAX_LAYERS {
            return Err(EngineError::InvalidCommand(format!(
                "numberOfLayers must be at most {}",
                MAX_LAYERS
            )));
        }
        let amount_change_type = request
            .amount_change_type
            .as_deref()
            .map(AmountChangeType::from_str)
            .transpose()
            .map_err(|e| EngineError::InvalidCommand(e.to_string()))?
            .unwrap_or(AmountChangeType::Fixed);
        let price_source_type = request
            .price_source_type
            .as_deref()
            .map(PriceSourceType::from_str)
            .transpose()
            .map_err(|e| EngineError::InvalidCommand(e.to_string()))?
            .unwrap_or(PriceSourceType::Mid);
        let ceiling_price = optional_decimal("ceilingPrice", request.ceiling_price.as_deref())?;
        let floor_price = optional_decimal("floorPrice", request.floor_price.as_deref())?;
        if let (Some(ceiling), Some(floor)) = (ceiling_price, floor_price) {
            if floor > ceiling {
                return Err(EngineError::InvalidCommand(
                    "floorPrice must not exceed ceilingPrice".to_string(),
                ));
            }
        }

        Ok(Self {
            user_id: required("userId", &request.user_id)?,
            client_id: required("clientId", &request.client_id)?,
            side_a,
            side_b,
            exchange_name: required("exchangeName", &request.exchange_name)?.to_lowercase(),
            oracle_exchange_name: request
                .oracle_exchange_name
                .map(|name| name.trim().to_lowercase())
                .filter(|name| !name.is_empty()),
            bid_spread: non_negative("bidSpread", decimal("bidSpread", &request.bid_spread)?)?,
            ask_spread: non_negative("askSpread", decimal("askSpread", &request.ask_spread)?)?,
            order_amount: positive("orderAmount", decimal("orderAmount", &request.order_amount)?)?,
            number_of_layers,
            amount_change_type,
            amount_change_per_layer: non_negative(
                "amountChangePerLayer",
                optional_decimal("amountChangePerLayer", request.amount_change_per_layer.as_deref())?
                    .unwrap_or(Decimal::ZERO),
            )?,
            price_source_type,
            ceiling_price,
            floor_price,
            check_interval_seconds: interval(request.check_interval_seconds)?,
            max_open_orders: request.max_open_orders,
        })
    }
}

impl TryFrom<VolumeRequest> for VolumeCommand {
    type Error = EngineError;

    fn try_from(request: VolumeRequest) -> Result<Self> {
        let (side_a, side_b) = split_pair(&request.pair)?;
        if request.num_total_trades == 0 {
            return Err(EngineError::InvalidCommand("numTotalTrades must be positive".to_string()));
        }
        Ok(Self {
            user_id: required("userId", &request.user_id)?,
            client_id: required("clientId", &request.client_id)?,
            side_a,
            side_b,
            exchange_name: required("exchangeName", &request.exchange_name)?.to_lowercase(),
            increment_percentage: decimal("incrementPercentage", &request.increment_percentage)?,
            price_push_rate: non_negative("pricePushRate", decimal("pricePushRate", &request.price_push_rate)?)?,
            amount_to_trade: positive("amountToTrade", decimal("amountToTrade", &request.amount_to_trade)?)?,
            num_total_trades: request.num_total_trades,
            check_interval_seconds: interval(request.check_interval_seconds)?,
        })
    }
}
