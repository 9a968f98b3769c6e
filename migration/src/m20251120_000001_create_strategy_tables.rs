use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ArbitrageStrategies::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ArbitrageStrategies::Id).big_unsigned().auto_increment().primary_key())
                    .col(ColumnDef::new(ArbitrageStrategies::UserId).string().not_null())
                    .col(ColumnDef::new(ArbitrageStrategies::ClientId).string().not_null())
                    .col(ColumnDef::new(ArbitrageStrategies::SideA).string().not_null()) // "BTC"
                    .col(ColumnDef::new(ArbitrageStrategies::SideB).string().not_null()) // "USDT"
                    .col(ColumnDef::new(ArbitrageStrategies::ExchangeAName).string().not_null())
                    .col(ColumnDef::new(ArbitrageStrategies::ExchangeBName).string().not_null())
                    .col(ColumnDef::new(ArbitrageStrategies::AmountToTrade).decimal_len(30, 12).not_null())
                    .col(ColumnDef::new(ArbitrageStrategies::MinProfitability).decimal_len(20, 8).not_null())
                    .col(ColumnDef::new(ArbitrageStrategies::CheckIntervalSeconds).unsigned().not_null().default(10))
                    .col(ColumnDef::new(ArbitrageStrategies::MaxOpenOrders).unsigned().null())
                    .col(ColumnDef::new(ArbitrageStrategies::Status).string().not_null().default("CREATED"))
                    .col(ColumnDef::new(ArbitrageStrategies::LastTradingAttemptAt).timestamp().null())
                    .col(ColumnDef::new(ArbitrageStrategies::PausedReason).text().null())
                    .col(ColumnDef::new(ArbitrageStrategies::CreatedAt).timestamp().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .col(ColumnDef::new(ArbitrageStrategies::UpdatedAt).timestamp().default(Expr::cust("CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP")))
                    .index(
                        Index::create()
                            .name("idx_arbitrage_user_client")
                            .table(ArbitrageStrategies::Table)
                            .col(ArbitrageStrategies::UserId)
                            .col(ArbitrageStrategies::ClientId)
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MarketMakingStrategies::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(MarketMakingStrategies::Id).big_unsigned().auto_increment().primary_key())
                    .col(ColumnDef::new(MarketMakingStrategies::UserId).string().not_null())
                    .col(ColumnDef::new(MarketMakingStrategies::ClientId).string().not_null())
                    .col(ColumnDef::new(MarketMakingStrategies::SideA).string().not_null())
                    .col(ColumnDef::new(MarketMakingStrategies::SideB).string().not_null())
                    .col(ColumnDef::new(MarketMakingStrategies::ExchangeName).string().not_null())
                    .col(ColumnDef::new(MarketMakingStrategies::OracleExchangeName).string().null())
                    .col(ColumnDef::new(MarketMakingStrategies::BidSpread).decimal_len(20, 8).not_null())
                    .col(ColumnDef::new(MarketMakingStrategies::AskSpread).decimal_len(20, 8).not_null())
                    .col(ColumnDef::new(MarketMakingStrategies::OrderAmount).decimal_len(30, 12).not_null())
                    .col(ColumnDef::new(MarketMakingStrategies::NumberOfLayers).unsigned().not_null().default(1))
                    .col(ColumnDef::new(MarketMakingStrategies::AmountChangeType).string().not_null().default("fixed")) // "fixed" or "percentage"
                    .col(ColumnDef::new(MarketMakingStrategies::AmountChangePerLayer).decimal_len(30, 12).not_null().default(0))
                    .col(ColumnDef::new(MarketMakingStrategies::PriceSourceType).string().not_null().default("mid"))
                    .col(ColumnDef::new(MarketMakingStrategies::CeilingPrice).decimal_len(30, 12).null())
                    .col(ColumnDef::new(MarketMakingStrategies::FloorPrice).decimal_len(30, 12).null())
                    .col(ColumnDef::new(MarketMakingStrategies::StartPrice).decimal_len(30, 12).null())
                    .col(ColumnDef::new(MarketMakingStrategies::CheckIntervalSeconds).unsigned().not_null().default(10))
                    .col(ColumnDef::new(MarketMakingStrategies::MaxOpenOrders).unsigned().null())
                    .col(ColumnDef::new(MarketMakingStrategies::Status).string().not_null().default("CREATED"))
                    .col(ColumnDef::new(MarketMakingStrategies::LastTradingAttemptAt).timestamp().null())
                    .col(ColumnDef::new(MarketMakingStrategies::PausedReason).text().null())
                    .col(ColumnDef::new(MarketMakingStrategies::CreatedAt).timestamp().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .col(ColumnDef::new(MarketMakingStrategies::UpdatedAt).timestamp().default(Expr::cust("CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP")))
                    .index(
                        Index::create()
                            .name("idx_market_making_user_client")
                            .table(MarketMakingStrategies::Table)
                            .col(MarketMakingStrategies::UserId)
                            .col(MarketMakingStrategies::ClientId)
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(VolumeStrategies::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(VolumeStrategies::Id).big_unsigned().auto_increment().primary_key())
                    .col(ColumnDef::new(VolumeStrategies::UserId).string().not_null())
                    .col(ColumnDef::new(VolumeStrategies::ClientId).string().not_null())
                    .col(ColumnDef::new(VolumeStrategies::SideA).string().not_null())
                    .col(ColumnDef::new(VolumeStrategies::SideB).string().not_null())
                    .col(ColumnDef::new(VolumeStrategies::ExchangeName).string().not_null())
                    .col(ColumnDef::new(VolumeStrategies::IncrementPercentage).decimal_len(20, 8).not_null())
                    .col(ColumnDef::new(VolumeStrategies::PricePushRate).decimal_len(20, 8).not_null())
                    .col(ColumnDef::new(VolumeStrategies::AmountToTrade).decimal_len(30, 12).not_null())
                    .col(ColumnDef::new(VolumeStrategies::NumTotalTrades).unsigned().not_null())
                    .col(ColumnDef::new(VolumeStrategies::TradesExecuted).unsigned().not_null().default(0))
                    .col(ColumnDef::new(VolumeStrategies::CurrentMakerPrice).decimal_len(30, 12).null())
                    .col(ColumnDef::new(VolumeStrategies::CheckIntervalSeconds).unsigned().not_null().default(10))
                    .col(ColumnDef::new(VolumeStrategies::Status).string().not_null().default("CREATED"))
                    .col(ColumnDef::new(VolumeStrategies::LastTradingAttemptAt).timestamp().null())
                    .col(ColumnDef::new(VolumeStrategies::PausedReason).text().null())
                    .col(ColumnDef::new(VolumeStrategies::CreatedAt).timestamp().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .col(ColumnDef::new(VolumeStrategies::UpdatedAt).timestamp().default(Expr::cust("CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP")))
                    .index(
                        Index::create()
                            .name("idx_volume_user_client")
                            .table(VolumeStrategies::Table)
                            .col(VolumeStrategies::UserId)
                            .col(VolumeStrategies::ClientId)
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(VolumeStrategies::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MarketMakingStrategies::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ArbitrageStrategies::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(crate) enum ArbitrageStrategies {
    Table,
    Id,
    UserId,
    ClientId,
    SideA,
    SideB,
    ExchangeAName,
    ExchangeBName,
    AmountToTrade,
    MinProfitability,
    CheckIntervalSeconds,
    MaxOpenOrders,
    Status,
    LastTradingAttemptAt,
    PausedReason,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub(crate) enum MarketMakingStrategies {
    Table,
    Id,
    UserId,
    ClientId,
    SideA,
    SideB,
    ExchangeName,
    OracleExchangeName,
    BidSpread,
    AskSpread,
    OrderAmount,
    NumberOfLayers,
    AmountChangeType,
    AmountChangePerLayer,
    PriceSourceType,
    CeilingPrice,
    FloorPrice,
    StartPrice,
    CheckIntervalSeconds,
    MaxOpenOrders,
    Status,
    LastTradingAttemptAt,
    PausedReason,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub(crate) enum VolumeStrategies {
    Table,
    Id,
    UserId,
    ClientId,
    SideA,
    SideB,
    ExchangeName,
    IncrementPercentage,
    PricePushRate,
    AmountToTrade,
    NumTotalTrades,
    TradesExecuted,
    CurrentMakerPrice,
    CheckIntervalSeconds,
    Status,
    LastTradingAttemptAt,
    PausedReason,
    CreatedAt,
    UpdatedAt,
}
