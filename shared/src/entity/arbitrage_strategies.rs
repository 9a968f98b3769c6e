//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;
use rust_decimal::Decimal;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "arbitrage_strategies")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: u64,
    pub user_id: String,
    pub client_id: String,
    pub side_a: String,
    pub side_b: String,
    pub exchange_a_name: String,
    pub exchange_b_name: String,
    #[sea_orm(column_type = "Decimal(Some((30, 12)))")]
    pub amount_to_trade: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub min_profitability: Decimal,
    pub check_interval_seconds: u32,
    #[sea_orm(nullable)]
    pub max_open_orders: Option<u32>,
    pub status: String, // "CREATED", "RUNNING", "PAUSED", "STOPPED", "DELETED"
    pub last_trading_attempt_at: Option<DateTimeUtc>,
    #[sea_orm(column_type = "Text", nullable)]
    pub paused_reason: Option<String>,
    pub created_at: Option<DateTimeUtc>,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
