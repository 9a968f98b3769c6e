//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;
use rust_decimal::Decimal;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "market_making_strategies")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: u64,
    pub user_id: String,
    pub client_id: String,
    pub side_a: String,
    pub side_b: String,
    pub exchange_name: String,
    #[sea_orm(nullable)]
    pub oracle_exchange_name: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub bid_spread: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub ask_spread: Decimal,
    #[sea_orm(column_type = "Decimal(Some((30, 12)))")]
    pub order_amount: Decimal,
    pub number_of_layers: u32,
    pub amount_change_type: String, // "fixed" or "percentage"
    #[sea_orm(column_type = "Decimal(Some((30, 12)))")]
    pub amount_change_per_layer: Decimal,
    pub price_source_type: String, // "mid", "best_bid", "best_ask", "last"
    #[sea_orm(column_type = "Decimal(Some((30, 12)))", nullable)]
    pub ceiling_price: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((30, 12)))", nullable)]
    pub floor_price: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((30, 12)))", nullable)]
    pub start_price: Option<Decimal>,
    pub check_interval_seconds: u32,
    #[sea_orm(nullable)]
    pub max_open_orders: Option<u32>,
    pub status: String,
    pub last_trading_attempt_at: Option<DateTimeUtc>,
    #[sea_orm(column_type = "Text", nullable)]
    pub paused_reason: Option<String>,
    pub created_at: Option<DateTimeUtc>,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
