//! Strategy instances and their runtime state

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle status persisted with every strategy row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyStatus {
    Created,
    Running,
    Paused,
    Stopped,
    Deleted,
}

impl StrategyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Running => "RUNNING",
            Self::Paused => "PAUSED",
            Self::Stopped => "STOPPED",
            Self::Deleted => "DELETED",
        }
    }

    /// Allowed transitions of the lifecycle state machine.
    pub fn can_transition_to(&self, next: StrategyStatus) -> bool {
        use StrategyStatus::*;
        match (self, next) {
            (Deleted, _) => false,
            (_, Deleted) => true,
            (Created, Running) => true,
            (Running, Paused) | (Running, Stopped) => true,
            (Paused, Running) | (Paused, Stopped) | (Paused, Paused) => true,
            (Stopped, Running) => true,
            _ => false,
        }
    }
}

impl fmt::Display for StrategyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CREATED" => Ok(Self::Created),
            "RUNNING" => Ok(Self::Running),
            "PAUSED" => Ok(Self::Paused),
            "STOPPED" => Ok(Self::Stopped),
            "DELETED" => Ok(Self::Deleted),
            other => Err(anyhow::anyhow!("Unknown strategy status: {}", other)),
        }
    }
}

/// The algorithm family a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Arbitrage,
    MarketMaking,
    Volume,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Arbitrage => "arbitrage",
            Self::MarketMaking => "market_making",
            Self::Volume => "volume",
        })
    }
}

/// Composite identifier of a running strategy handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StrategyKey {
    pub kind: StrategyKind,
    pub user_id: String,
    pub client_id: String,
}

impl StrategyKey {
    pub fn new(kind: StrategyKind, user_id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            kind,
            user_id: user_id.into(),
            client_id: client_id.into(),
        }
    }
}

impl fmt::Display for StrategyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.user_id, self.client_id, self.kind)
    }
}

/// How order size grows from one market-making layer to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountChangeType {
    Fixed,
    Percentage,
}

impl AmountChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Percentage => "percentage",
        }
    }
}

impl FromStr for AmountChangeType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "percentage" => Ok(Self::Percentage),
            other => Err(anyhow::anyhow!("Unknown amount change type: {}", other)),
        }
    }
}

/// Reference price used to centre market-making quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSourceType {
    Mid,
    BestBid,
    BestAsk,
    Last,
}

impl PriceSourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mid => "mid",
            Self::BestBid => "best_bid",
            Self::BestAsk => "best_ask",
            Self::Last => "last",
        }
    }
}

impl FromStr for PriceSourceType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mid" | "mid_price" => Ok(Self::Mid),
            "best_bid" => Ok(Self::BestBid),
            "best_ask" => Ok(Self::BestAsk),
            "last" | "last_price" => Ok(Self::Last),
            other => Err(anyhow::anyhow!("Unknown price source type: {}", other)),
        }
    }
}

/// Fields every strategy row carries regardless of type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeState {
    pub status: StrategyStatus,
    pub last_trading_attempt_at: Option<DateTime<Utc>>,
    pub paused_reason: Option<String>,
}

impl RuntimeState {
    pub fn new(status: StrategyStatus) -> Self {
        Self {
            status,
            last_trading_attempt_at: None,
            paused_reason: None,
        }
    }
}

/// Common view over the concrete strategy rows, used by stores and the scheduler.
pub trait StrategyRow: Clone + Send + Sync + 'static {
    const KIND: StrategyKind;

    fn id(&self) -> u64;
    fn set_id(&mut self, id: u64);
    fn user_id(&self) -> &str;
    fn client_id(&self) -> &str;
    fn check_interval_seconds(&self) -> u32;
    fn state(&self) -> &RuntimeState;
    fn state_mut(&mut self) -> &mut RuntimeState;

    fn status(&self) -> StrategyStatus {
        self.state().status
    }

    fn key(&self) -> StrategyKey {
        StrategyKey::new(Self::KIND, self.user_id(), self.client_id())
    }
}

macro_rules! impl_strategy_row {
    ($row:ty, $kind:expr) => {
        impl StrategyRow for $row {
            const KIND: StrategyKind = $kind;

            fn id(&self) -> u64 {
                self.id
            }

            fn set_id(&mut self, id: u64) {
                self.id = id;
            }

            fn user_id(&self) -> &str {
                &self.user_id
            }

            fn client_id(&self) -> &str {
                &self.client_id
            }

            fn check_interval_seconds(&self) -> u32 {
                self.check_interval_seconds
            }

            fn state(&self) -> &RuntimeState {
                &self.state
            }

            fn state_mut(&mut self) -> &mut RuntimeState {
                &mut self.state
            }
        }
    };
}

/// Cross-exchange arbitrage between `exchange_a_name` and `exchange_b_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageStrategy {
    pub id: u64,
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
    pub state: RuntimeState,
}

impl ArbitrageStrategy {
    pub fn pair(&self) -> String {
        format_pair(&self.side_a, &self.side_b)
    }
}

/// Layered two-sided quoting on one exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketMakingStrategy {
    pub id: u64,
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
    pub start_price: Option<Decimal>,
    pub check_interval_seconds: u32,
    pub max_open_orders: Option<u32>,
    pub state: RuntimeState,
}

impl MarketMakingStrategy {
    pub fn pair(&self) -> String {
        format_pair(&self.side_a, &self.side_b)
    }

    /// Venue used for pricing; falls back to the trading exchange.
    pub fn pricing_exchange(&self) -> &str {
        self.oracle_exchange_name
            .as_deref()
            .unwrap_or(&self.exchange_name)
    }
}

/// Two-account volume generation that nudges the price on every trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeStrategy {
    pub id: u64,
    pub user_id: String,
    pub client_id: String,
    pub side_a: String,
    pub side_b: String,
    pub exchange_name: String,
    pub increment_percentage: Decimal,
    pub price_push_rate: Decimal,
    pub amount_to_trade: Decimal,
    pub num_total_trades: u32,
    pub trades_executed: u32,
    pub current_maker_price: Option<Decimal>,
    pub check_interval_seconds: u32,
    pub state: RuntimeState,
}

impl VolumeStrategy {
    pub fn pair(&self) -> String {
        format_pair(&self.side_a, &self.side_b)
    }

    pub fn is_complete(&self) -> bool {
        self.trades_executed >= self.num_total_trades
    }
}

impl_strategy_row!(ArbitrageStrategy, StrategyKind::Arbitrage);
impl_strategy_row!(MarketMakingStrategy, StrategyKind::MarketMaking);
impl_strategy_row!(VolumeStrategy, StrategyKind::Volume);

pub fn format_pair(side_a: &str, side_b: &str) -> String {
    format!("{}/{}", side_a.to_uppercase(), side_b.to_uppercase())
}
