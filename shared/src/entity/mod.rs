//! `SeaORM` entities for persisted strategy instances

pub mod arbitrage_strategies;
pub mod market_making_strategies;
pub mod volume_strategies;
