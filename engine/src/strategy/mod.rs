//! Strategy algorithms
//!
//! Each algorithm validates and persists new instances, evaluates one RUNNING row
//! per call and cancels its orders on teardown. Evaluation is stateless between
//! calls: everything it needs is read from the row and the exchanges.

mod arbitrage;
mod market_making;
mod volume;

pub use arbitrage::ArbitrageAlgorithm;
pub use market_making::MarketMakingAlgorithm;
pub use volume::VolumeAlgorithm;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::commands::StrategyCommand;
use crate::error::{EngineError, Result};
use crate::exchange::ExchangeHub;
use crate::model::{StrategyRow, StrategyStatus};
use crate::store::StrategyStore;

/// Reason recorded on rows paused through the user-facing API.
pub const PAUSED_BY_USER: &str = "paused by user";

#[async_trait]
pub trait Strategy: Send + Sync + 'static {
    type Row: StrategyRow;
    type Command: StrategyCommand;

    fn store(&self) -> &Arc<dyn StrategyStore<Self::Row>>;

    fn hub(&self) -> &Arc<ExchangeHub>;

    /// Validate a command against the exchanges and build the RUNNING row to persist.
    async fn prepare(&self, command: &Self::Command) -> Result<Self::Row>;

    /// One trading attempt.
    async fn evaluate(&self, row: &Self::Row) -> Result<()>;

    /// Cancel unfilled orders belonging to the row. Returns the number cancelled.
    async fn on_teardown(&self, row: &Self::Row) -> Result<usize>;

    /// Create the strategy, or bring an existing non-deleted row of the same
    /// client id back to RUNNING.
    async fn on_create(&self, command: Self::Command) -> Result<Self::Row> {
        let row = self.prepare(&command).await?;
        let store = self.store();
        let kind = <Self::Row as StrategyRow>::KIND;

        if let Some(existing) = store
            .find_by_client(command.user_id(), command.client_id())
            .await?
        {
            if existing.status() != StrategyStatus::Running {
                store.mark_running(existing.id()).await?;
                info!(
                    "▶️ Resumed {} strategy {} for user {} (was {})",
                    kind,
                    existing.id(),
                    existing.user_id(),
                    existing.status()
                );
            }
            return store
                .find_by_id(existing.id(), None)
                .await?
                .ok_or_else(|| EngineError::not_found(kind, existing.id()));
        }

        let created = store.create(row).await?;
        info!(
            "✅ Created {} strategy {} for user {} ({})",
            kind,
            created.id(),
            created.user_id(),
            created.client_id()
        );
        Ok(created)
    }
}
