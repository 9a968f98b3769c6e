//! sea-orm backed stores over the `shared::entity` tables

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use shared::entity::{arbitrage_strategies, market_making_strategies, volume_strategies};

use crate::error::Result;
use crate::model::{
    ArbitrageStrategy, MarketMakingStrategy, RuntimeState, StrategyRow, StrategyStatus,
    VolumeStrategy,
};
use crate::store::{StrategyFilter, StrategyStore, VolumeStore};

fn runtime_state(
    status: &str,
    last_trading_attempt_at: Option<DateTime<Utc>>,
    paused_reason: Option<String>,
) -> Result<RuntimeState> {
    Ok(RuntimeState {
        status: status.parse::<StrategyStatus>()?,
        last_trading_attempt_at,
        paused_reason,
    })
}

macro_rules! sea_store {
    ($store:ident, $entity:ident, $row:ty, $to_row:ident, $to_active:ident) => {
        pub struct $store {
            db: Arc<DatabaseConnection>,
        }

        impl $store {
            pub fn new(db: Arc<DatabaseConnection>) -> Self {
                Self { db }
            }
        }

        #[async_trait]
        impl StrategyStore<$row> for $store {
            async fn create(&self, mut row: $row) -> Result<$row> {
                let result = $entity::Entity::insert($to_active(&row))
                    .exec(self.db.as_ref())
                    .await?;
                row.set_id(result.last_insert_id);
                Ok(row)
            }

            async fn update_status(&self, id: u64, status: StrategyStatus) -> Result<()> {
                $entity::Entity::update_many()
                    .col_expr($entity::Column::Status, Expr::value(status.as_str()))
                    .col_expr($entity::Column::UpdatedAt, Expr::value(Utc::now()))
                    .filter($entity::Column::Id.eq(id))
                    .exec(self.db.as_ref())
                    .await?;
                Ok(())
            }

            async fn update_last_attempt(&self, id: u64, at: DateTime<Utc>) -> Result<()> {
                $entity::Entity::update_many()
                    .col_expr($entity::Column::LastTradingAttemptAt, Expr::value(at))
                    .filter($entity::Column::Id.eq(id))
                    .exec(self.db.as_ref())
                    .await?;
                Ok(())
            }

            async fn update_paused_reason(&self, id: u64, reason: Option<String>) -> Result<()> {
                $entity::Entity::update_many()
                    .col_expr($entity::Column::PausedReason, Expr::value(reason))
                    .filter($entity::Column::Id.eq(id))
                    .exec(self.db.as_ref())
                    .await?;
                Ok(())
            }

            async fn find_running(&self) -> Result<Vec<$row>> {
                $entity::Entity::find()
                    .filter($entity::Column::Status.eq(StrategyStatus::Running.as_str()))
                    .order_by_asc($entity::Column::Id)
                    .all(self.db.as_ref())
                    .await?
                    .into_iter()
                    .map($to_row)
                    .collect()
            }

            async fn find_by_id(
                &self,
                id: u64,
                filter: Option<&StrategyFilter>,
            ) -> Result<Option<$row>> {
                let mut query = $entity::Entity::find_by_id(id);
                if let Some(user_id) = filter.and_then(|f| f.user_id.as_deref()) {
                    query = query.filter($entity::Column::UserId.eq(user_id));
                }
                if let Some(status) = filter.and_then(|f| f.status) {
                    query = query.filter($entity::Column::Status.eq(status.as_str()));
                }
                query.one(self.db.as_ref()).await?.map($to_row).transpose()
            }

            async fn find_by_client(&self, user_id: &str, client_id: &str) -> Result<Option<$row>> {
                $entity::Entity::find()
                    .filter($entity::Column::UserId.eq(user_id))
                    .filter($entity::Column::ClientId.eq(client_id))
                    .filter($entity::Column::Status.ne(StrategyStatus::Deleted.as_str()))
                    .order_by_desc($entity::Column::Id)
                    .one(self.db.as_ref())
                    .await?
                    .map($to_row)
                    .transpose()
            }
        }
    };
}

fn arbitrage_row(model: arbitrage_strategies::Model) -> Result<ArbitrageStrategy> {
    Ok(ArbitrageStrategy {
        state: runtime_state(&model.status, model.last_trading_attempt_at, model.paused_reason)?,
        id: model.id,
        user_id: model.user_id,
        client_id: model.client_id,
        side_a: model.side_a,
        side_b: model.side_b,
        exchange_a_name: model.exchange_a_name,
        exchange_b_name: model.exchange_b_name,
        amount_to_trade: model.amount_to_trade,
        min_profitability: model.min_profitability,
        check_interval_seconds: model.check_interval_seconds,
        max_open_orders: model.max_open_orders,
    })
}

fn arbitrage_active(row: &ArbitrageStrategy) -> arbitrage_strategies::ActiveModel {
    let now = Utc::now();
    arbitrage_strategies::ActiveModel {
        user_id: ActiveValue::Set(row.user_id.clone()),
        client_id: ActiveValue::Set(row.client_id.clone()),
        side_a: ActiveValue::Set(row.side_a.clone()),
        side_b: ActiveValue::Set(row.side_b.clone()),
        exchange_a_name: ActiveValue::Set(row.exchange_a_name.clone()),
        exchange_b_name: ActiveValue::Set(row.exchange_b_name.clone()),
        amount_to_trade: ActiveValue::Set(row.amount_to_trade),
        min_profitability: ActiveValue::Set(row.min_profitability),
        check_interval_seconds: ActiveValue::Set(row.check_interval_seconds),
        max_open_orders: ActiveValue::Set(row.max_open_orders),
        status: ActiveValue::Set(row.state.status.as_str().to_string()),
        last_trading_attempt_at: ActiveValue::Set(row.state.last_trading_attempt_at),
        paused_reason: ActiveValue::Set(row.state.paused_reason.clone()),
        created_at: ActiveValue::Set(Some(now)),
        updated_at: ActiveValue::Set(Some(now)),
        ..Default::default()
    }
}

fn market_making_row(model: market_making_strategies::Model) -> Result<MarketMakingStrategy> {
    Ok(MarketMakingStrategy {
        state: runtime_state(&model.status, model.last_trading_attempt_at, model.paused_reason)?,
        id: model.id,
        user_id: model.user_id,
        client_id: model.client_id,
        side_a: model.side_a,
        side_b: model.side_b,
        exchange_name: model.exchange_name,
        oracle_exchange_name: model.oracle_exchange_name,
        bid_spread: model.bid_spread,
        ask_spread: model.ask_spread,
        order_amount: model.order_amount,
        number_of_layers: model.number_of_layers,
        amount_change_type: model.amount_change_type.parse()?,
        amount_change_per_layer: model.amount_change_per_layer,
        price_source_type: model.price_source_type.parse()?,
        ceiling_price: model.ceiling_price,
        floor_price: model.floor_price,
        start_price: model.start_price,
        check_interval_seconds: model.check_interval_seconds,
        max_open_orders: model.max_open_orders,
    })
}

fn market_making_active(row: &MarketMakingStrategy) -> market_making_strategies::ActiveModel {
    let now = Utc::now();
    market_making_strategies::ActiveModel {
        user_id: ActiveValue::Set(row.user_id.clone()),
        client_id: ActiveValue::Set(row.client_id.clone()),
        side_a: ActiveValue::Set(row.side_a.clone()),
        side_b: ActiveValue::Set(row.side_b.clone()),
        exchange_name: ActiveValue::Set(row.exchange_name.clone()),
        oracle_exchange_name: ActiveValue::Set(row.oracle_exchange_name.clone()),
        bid_spread: ActiveValue::Set(row.bid_spread),
        ask_spread: ActiveValue::Set(row.ask_spread),
        order_amount: ActiveValue::Set(row.order_amount),
        number_of_layers: ActiveValue::Set(row.number_of_layers),
        amount_change_type: ActiveValue::Set(row.amount_change_type.as_str().to_string()),
        amount_change_per_layer: ActiveValue::Set(row.amount_change_per_layer),
        price_source_type: ActiveValue::Set(row.price_source_type.as_str().to_string()),
        ceiling_price: ActiveValue::Set(row.ceiling_price),
        floor_price: ActiveValue::Set(row.floor_price),
        start_price: ActiveValue::Set(row.start_price),
        check_interval_seconds: ActiveValue::Set(row.check_interval_seconds),
        max_open_orders: ActiveValue::Set(row.max_open_orders),
        status: ActiveValue::Set(row.state.status.as_str().to_string()),
        last_trading_attempt_at: ActiveValue::Set(row.state.last_trading_attempt_at),
        paused_reason: ActiveValue::Set(row.state.paused_reason.clone()),
        created_at: ActiveValue::Set(Some(now)),
        updated_at: ActiveValue::Set(Some(now)),
        ..Default::default()
    }
}

fn volume_row(model: volume_strategies::Model) -> Result<VolumeStrategy> {
    Ok(VolumeStrategy {
        state: runtime_state(&model.status, model.last_trading_attempt_at, model.paused_reason)?,
        id: model.id,
        user_id: model.user_id,
        client_id: model.client_id,
        side_a: model.side_a,
        side_b: model.side_b,
        exchange_name: model.exchange_name,
        increment_percentage: model.increment_percentage,
        price_push_rate: model.price_push_rate,
        amount_to_trade: model.amount_to_trade,
        num_total_trades: model.num_total_trades,
        trades_executed: model.trades_executed,
        current_maker_price: model.current_maker_price,
        check_interval_seconds: model.check_interval_seconds,
    })
}

fn volume_active(row: &VolumeStrategy) -> volume_strategies::ActiveModel {
    let now = Utc::now();
    volume_strategies::ActiveModel {
        user_id: ActiveValue::Set(row.user_id.clone()),
        client_id: ActiveValue::Set(row.client_id.clone()),
        side_a: ActiveValue::Set(row.side_a.clone()),
        side_b: ActiveValue::Set(row.side_b.clone()),
        exchange_name: ActiveValue::Set(row.exchange_name.clone()),
        increment_percentage: ActiveValue::Set(row.increment_percentage),
        price_push_rate: ActiveValue::Set(row.price_push_rate),
        amount_to_trade: ActiveValue::Set(row.amount_to_trade),
        num_total_trades: ActiveValue::Set(row.num_total_trades),
        trades_executed: ActiveValue::Set(row.trades_executed),
        current_maker_price: ActiveValue::Set(row.current_maker_price),
        check_interval_seconds: ActiveValue::Set(row.check_interval_seconds),
        status: ActiveValue::Set(row.state.status.as_str().to_string()),
        last_trading_attempt_at: ActiveValue::Set(row.state.last_trading_attempt_at),
        paused_reason: ActiveValue::Set(row.state.paused_reason.clone()),
        created_at: ActiveValue::Set(Some(now)),
        updated_at: ActiveValue::Set(Some(now)),
        ..Default::default()
    }
}

sea_store!(SeaArbitrageStore, arbitrage_strategies, ArbitrageStrategy, arbitrage_row, arbitrage_active);
sea_store!(SeaMarketMakingStore, market_making_strategies, MarketMakingStrategy, market_making_row, market_making_active);
sea_store!(SeaVolumeStore, volume_strategies, VolumeStrategy, volume_row, volume_active);

#[async_trait]
impl VolumeStore for SeaVolumeStore {
    async fn update_after_trade(
        &self,
        id: u64,
        trades_executed: u32,
        current_maker_price: Decimal,
    ) -> Result<()> {
        volume_strategies::Entity::update_many()
            .col_expr(volume_strategies::Column::TradesExecuted, Expr::value(trades_executed))
            .col_expr(volume_strategies::Column::CurrentMakerPrice, Expr::value(current_maker_price))
            .col_expr(volume_strategies::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(volume_strategies::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }
}
