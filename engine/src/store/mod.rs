//! Persistence contract for strategy rows
//!
//! Every update touches a single column (or, for trade results, the two columns
//! written together), so concurrent status and timestamp writers never overwrite
//! each other's fields.

mod memory;
mod sea;

pub use memory::MemoryStrategyStore;
pub use sea::{SeaArbitrageStore, SeaMarketMakingStore, SeaVolumeStore};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::Result;
use crate::model::{StrategyRow, StrategyStatus, VolumeStrategy};

/// Optional narrowing of [`StrategyStore::find_by_id`].
#[derive(Debug, Clone, Default)]
pub struct StrategyFilter {
    pub user_id: Option<String>,
    pub status: Option<StrategyStatus>,
}

impl StrategyFilter {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            status: None,
        }
    }

    pub fn matches<R: StrategyRow>(&self, row: &R) -> bool {
        self.user_id.as_deref().map_or(true, |u| row.user_id() == u)
            && self.status.map_or(true, |s| row.status() == s)
    }
}

#[async_trait]
pub trait StrategyStore<R: StrategyRow>: Send + Sync {
    /// Insert a row and return it with its assigned id.
    async fn create(&self, row: R) -> Result<R>;

    async fn update_status(&self, id: u64, status: StrategyStatus) -> Result<()>;

    async fn update_last_attempt(&self, id: u64, at: DateTime<Utc>) -> Result<()>;

    async fn update_paused_reason(&self, id: u64, reason: Option<String>) -> Result<()>;

    /// Rows with status RUNNING, ordered by id.
    async fn find_running(&self) -> Result<Vec<R>>;

    async fn find_by_id(&self, id: u64, filter: Option<&StrategyFilter>) -> Result<Option<R>>;

    /// Most recent row of a user's client id that is not deleted.
    async fn find_by_client(&self, user_id: &str, client_id: &str) -> Result<Option<R>>;

    /// Move a row to PAUSED and record why.
    async fn mark_paused(&self, id: u64, reason: &str) -> Result<()> {
        self.update_status(id, StrategyStatus::Paused).await?;
        self.update_paused_reason(id, Some(reason.to_string())).await
    }

    /// Move a row back to RUNNING and clear any paused reason.
    async fn mark_running(&self, id: u64) -> Result<()> {
        self.update_status(id, StrategyStatus::Running).await?;
        self.update_paused_reason(id, None).await
    }
}

#[async_trait]
pub trait VolumeStore: StrategyStore<VolumeStrategy> {
    /// Record a completed maker/taker round in one write.
    async fn update_after_trade(
        &self,
        id: u64,
        trades_executed: u32,
        current_maker_price: Decimal,
    ) -> Result<()>;
}
