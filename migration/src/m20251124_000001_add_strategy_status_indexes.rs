use sea_orm_migration::prelude::*;

use crate::m20251120_000001_create_strategy_tables::{
    ArbitrageStrategies, MarketMakingStrategies, VolumeStrategies,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

// The scheduler loads every RUNNING row once per tick.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("idx_arbitrage_status")
                    .table(ArbitrageStrategies::Table)
                    .col(ArbitrageStrategies::Status)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_market_making_status")
                    .table(MarketMakingStrategies::Table)
                    .col(MarketMakingStrategies::Status)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_volume_status")
                    .table(VolumeStrategies::Table)
                    .col(VolumeStrategies::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_volume_status").table(VolumeStrategies::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_market_making_status").table(MarketMakingStrategies::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_arbitrage_status").table(ArbitrageStrategies::Table).to_owned())
            .await
    }
}
