use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::model::{StrategyRow, StrategyStatus, VolumeStrategy};
use crate::store::{StrategyFilter, StrategyStore, VolumeStore};

/// Process-local store, used when no database is configured and in tests.
///
/// Updates of unknown ids are ignored, matching an `UPDATE` that hits no row.
pub struct MemoryStrategyStore<R> {
    rows: RwLock<BTreeMap<u64, R>>,
    next_id: AtomicU64,
}

impl<R: StrategyRow> MemoryStrategyStore<R> {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Every stored row regardless of status.
    pub async fn all(&self) -> Vec<R> {
        self.rows.read().await.values().cloned().collect()
    }

    /// Insert a row as-is, keeping its id. Useful to set up state in tests.
    pub async fn insert(&self, row: R) -> R {
        self.next_id.fetch_max(row.id() + 1, Ordering::SeqCst);
        self.rows.write().await.insert(row.id(), row.clone());
        row
    }

    async fn modify(&self, id: u64, f: impl FnOnce(&mut R) + Send) {
        if let Some(row) = self.rows.write().await.get_mut(&id) {
            f(row);
        }
    }
}

impl<R: StrategyRow> Default for MemoryStrategyStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: StrategyRow> StrategyStore<R> for MemoryStrategyStore<R> {
    async fn create(&self, mut row: R) -> Result<R> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        row.set_id(id);
        self.rows.write().await.insert(id, row.clone());
        Ok(row)
    }

    async fn update_status(&self, id: u64, status: StrategyStatus) -> Result<()> {
        self.modify(id, |row| row.state_mut().status = status).await;
        Ok(())
    }

    async fn update_last_attempt(&self, id: u64, at: DateTime<Utc>) -> Result<()> {
        self.modify(id, |row| row.state_mut().last_trading_attempt_at = Some(at))
            .await;
        Ok(())
    }

    async fn update_paused_reason(&self, id: u64, reason: Option<String>) -> Result<()> {
        self.modify(id, |row| row.state_mut().paused_reason = reason).await;
        Ok(())
    }

    async fn find_running(&self) -> Result<Vec<R>> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|row| row.status() == StrategyStatus::Running)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: u64, filter: Option<&StrategyFilter>) -> Result<Option<R>> {
        Ok(self
            .rows
            .read()
            .await
            .get(&id)
            .filter(|row| filter.map_or(true, |f| f.matches(*row)))
            .cloned())
    }

    async fn find_by_client(&self, user_id: &str, client_id: &str) -> Result<Option<R>> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .rev()
            .find(|row| {
                row.user_id() == user_id
                    && row.client_id() == client_id
                    && row.status() != StrategyStatus::Deleted
            })
            .cloned())
    }
}

#[async_trait]
impl VolumeStore for MemoryStrategyStore<VolumeStrategy> {
    async fn update_after_trade(
        &self,
        id: u64,
        trades_executed: u32,
        current_maker_price: Decimal,
    ) -> Result<()> {
        self.modify(id, |row| {
            row.trades_executed = trades_executed;
            row.current_maker_price = Some(current_maker_price);
        })
        .await;
        Ok(())
    }
}
