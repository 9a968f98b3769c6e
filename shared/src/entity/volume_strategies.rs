//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;
use rust_decimal::Decimal;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "volume_strategies")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: u64,
    pub user_id: String,
    pub client_id: String,
    pub side_a: String,
    pub side_b: String,
    pub exchange_name: String,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub increment_percentage: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub price_push_rate: Decimal,
    #[sea_orm(column_type = "Decimal(Some((30, 12)))")]
    pub amount_to_trade: Decimal,
    pub num_total_trades: u32,
    pub trades_executed: u32,
    #[sea_orm(column_type = "Decimal(Some((30, 12)))", nullable)]
    pub current_maker_price: Option<Decimal>,
    pub check_interval_seconds: u32,
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
