//! Strategy engine: runs arbitrage, market-making and volume strategies for many users
//!
//! - **Pricing**: VWAP, arbitrage tests, layered quote plans, maker price pushing
//! - **Exchange**: per-account client trait, shared hub with order tracking, paper venue
//! - **Store**: strategy persistence contract with memory and sea-orm implementations
//! - **Strategy**: the three algorithms behind a common `Strategy` trait
//! - **Registry / Service**: idempotent create, pause, resume, stop and delete
//! - **Scheduler**: interval-gated evaluation with failure isolation and tick locking
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use strategy_engine::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let hub = Arc::new(ExchangeHub::new());
//!     let store = Arc::new(MemoryStrategyStore::<MarketMakingStrategy>::new());
//!     let market_making = Arc::new(MarketMakingAlgorithm::new(hub, store));
//!     let scheduler = ExecutionScheduler::new(
//!         vec![market_making as Arc<dyn TickTarget>],
//!         Arc::new(SystemClock),
//!         Arc::new(LocalTickLock),
//!     );
//!     scheduler.tick().await;
//!     Ok(())
//! }
//! ```

pub mod commands;
pub mod error;
pub mod exchange;
pub mod model;
pub mod pricing;
pub mod registry;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod strategy;

// Re-export commonly used types
pub mod prelude {
    pub use crate::commands::*;
    pub use crate::error::*;
    pub use crate::exchange::*;
    pub use crate::model::*;
    pub use crate::pricing::*;
    pub use crate::registry::*;
    pub use crate::scheduler::*;
    pub use crate::service::*;
    pub use crate::store::*;
    pub use crate::strategy::*;
}

pub use error::{EngineError, Result};
