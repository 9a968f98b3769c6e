//! User-facing strategy operations: create, pause, resume, stop and delete

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::commands::{
    ArbitrageCommand, MarketMakingCommand, StrategyCommand, StrategyRequest, VolumeCommand,
};
use crate::error::{EngineError, Result};
use crate::model::{
    ArbitrageStrategy, MarketMakingStrategy, StrategyKind, StrategyRow, StrategyStatus,
    VolumeStrategy,
};
use crate::registry::{LifecycleRegistry, PersistedHandle};
use crate::store::StrategyFilter;
use crate::strategy::{
    ArbitrageAlgorithm, MarketMakingAlgorithm, Strategy, VolumeAlgorithm, PAUSED_BY_USER,
};

/// Short description of a strategy row, returned by [`StrategyService::submit`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategySummary {
    pub kind: StrategyKind,
    pub id: u64,
    pub user_id: String,
    pub client_id: String,
    pub status: StrategyStatus,
}

impl StrategySummary {
    fn of<R: StrategyRow>(row: &R) -> Self {
        Self {
            kind: R::KIND,
            id: row.id(),
            user_id: row.user_id().to_string(),
            client_id: row.client_id().to_string(),
            status: row.status(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Pause,
    Resume,
    Stop,
    Delete,
}

impl Action {
    fn target(self) -> StrategyStatus {
        match self {
            Self::Pause => StrategyStatus::Paused,
            Self::Resume => StrategyStatus::Running,
            Self::Stop => StrategyStatus::Stopped,
            Self::Delete => StrategyStatus::Deleted,
        }
    }
}

pub struct StrategyService {
    registry: Arc<LifecycleRegistry>,
    arbitrage: Arc<ArbitrageAlgorithm>,
    market_making: Arc<MarketMakingAlgorithm>,
    volume: Arc<VolumeAlgorithm>,
}

impl StrategyService {
    pub fn new(
        registry: Arc<LifecycleRegistry>,
        arbitrage: Arc<ArbitrageAlgorithm>,
        market_making: Arc<MarketMakingAlgorithm>,
        volume: Arc<VolumeAlgorithm>,
    ) -> Self {
        Self {
            registry,
            arbitrage,
            market_making,
            volume,
        }
    }

    pub fn registry(&self) -> &Arc<LifecycleRegistry> {
        &self.registry
    }

    pub async fn create_arbitrage(
        &self,
        command: ArbitrageCommand,
    ) -> Result<ArbitrageStrategy> {
        self.create(&self.arbitrage, command).await
    }

    pub async fn create_market_making(
        &self,
        command: MarketMakingCommand,
    ) -> Result<MarketMakingStrategy> {
        self.create(&self.market_making, command).await
    }

    pub async fn create_volume(&self, command: VolumeCommand) -> Result<VolumeStrategy> {
        self.create(&self.volume, command).await
    }

    /// Convert a wire-level request and create the strategy it describes.
    pub async fn submit(&self, request: StrategyRequest) -> Result<StrategySummary> {
        match request {
            StrategyRequest::Arbitrage(request) => {
                let row = self.create_arbitrage(request.try_into()?).await?;
                Ok(StrategySummary::of(&row))
            }
            StrategyRequest::MarketMaking(request) => {
                let row = self.create_market_making(request.try_into()?).await?;
                Ok(StrategySummary::of(&row))
            }
            StrategyRequest::Volume(request) => {
                let row = self.create_volume(request.try_into()?).await?;
                Ok(StrategySummary::of(&row))
            }
        }
    }

    /// Pause with the manual-pause reason. Unfilled orders are cancelled.
    pub async fn pause(&self, kind: StrategyKind, user_id: &str, id: u64) -> Result<StrategyStatus> {
        self.dispatch(kind, user_id, id, Action::Pause).await
    }

    pub async fn resume(&self, kind: StrategyKind, user_id: &str, id: u64) -> Result<StrategyStatus> {
        self.dispatch(kind, user_id, id, Action::Resume).await
    }

    pub async fn stop(&self, kind: StrategyKind, user_id: &str, id: u64) -> Result<StrategyStatus> {
        self.dispatch(kind, user_id, id, Action::Stop).await
    }

    /// Soft delete: the row stays, flagged DELETED.
    pub async fn delete(&self, kind: StrategyKind, user_id: &str, id: u64) -> Result<StrategyStatus> {
        self.dispatch(kind, user_id, id, Action::Delete).await
    }

    async fn create<S: Strategy>(&self, strategy: &Arc<S>, command: S::Command) -> Result<S::Row> {
        let key = command.key();
        let handle = Arc::new(PersistedHandle::new(Arc::clone(strategy), command.clone()));
        self.registry.start(key, handle).await?;

        // The registry may hold a RUNNING handle for a row that finished since.
        match strategy
            .store()
            .find_by_client(command.user_id(), command.client_id())
            .await?
        {
            Some(row) => Ok(row),
            None => strategy.on_create(command).await,
        }
    }

    async fn dispatch(
        &self,
        kind: StrategyKind,
        user_id: &str,
        id: u64,
        action: Action,
    ) -> Result<StrategyStatus> {
        match kind {
            StrategyKind::Arbitrage => self.apply(self.arbitrage.as_ref(), user_id, id, action).await,
            StrategyKind::MarketMaking => {
                self.apply(self.market_making.as_ref(), user_id, id, action).await
            }
            StrategyKind::Volume => self.apply(self.volume.as_ref(), user_id, id, action).await,
        }
    }

    async fn apply<S: Strategy>(
        &self,
        strategy: &S,
        user_id: &str,
        id: u64,
        action: Action,
    ) -> Result<StrategyStatus> {
        let kind = <S::Row as StrategyRow>::KIND;
        let store = strategy.store();
        let row = store
            .find_by_id(id, Some(&StrategyFilter::user(user_id)))
            .await?
            .ok_or_else(|| EngineError::not_found(kind, id))?;
        let key = row.key();
        let target = action.target();

        if action == Action::Resume && row.status() == StrategyStatus::Running {
            return Ok(StrategyStatus::Running);
        }
        if !row.status().can_transition_to(target) {
            return Err(EngineError::InvalidCommand(format!(
                "{} strategy {} cannot go from {} to {}",
                kind,
                id,
                row.status(),
                target
            )));
        }

        if action == Action::Resume {
            store.mark_running(id).await?;
            self.registry.resume(&key).await?;
            info!("▶️ Resumed {} strategy {} for user {}", kind, id, user_id);
            return Ok(target);
        }

        if let Err(e) = strategy.on_teardown(&row).await {
            warn!(
                "⚠️ Could not cancel orders of {} strategy {}, pausing instead: {}",
                kind, id, e
            );
            store.mark_paused(id, &e.to_string()).await?;
            self.registry.pause(&key).await?;
            return Err(e);
        }

        match action {
            Action::Pause => {
                store.mark_paused(id, PAUSED_BY_USER).await?;
                self.registry.pause(&key).await?;
            }
            _ => {
                store.update_status(id, target).await?;
                store.update_paused_reason(id, None).await?;
                self.registry.stop(&key).await?;
            }
        }
        info!("{} strategy {} of user {} is now {}", kind, id, user_id, target);
        Ok(target)
    }
}
