//! In-process registry of live strategy handles
//!
//! Guarantees at most one handle per `(kind, user, client)` key and makes
//! start/pause/stop idempotent when the same request arrives twice. Every
//! transition takes a per-key gate, so duplicate starts of one key serialize
//! while other keys proceed. The entry map lock is never held across a handle call.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};

use crate::commands::StrategyCommand;
use crate::error::Result;
use crate::model::{StrategyKey, StrategyRow, StrategyStatus};
use crate::strategy::Strategy;

/// Something the registry can start, pause and stop.
#[async_trait]
pub trait StrategyHandle: Send + Sync {
    async fn start(&self) -> Result<()>;
    async fn pause(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
}

struct Entry {
    handle: Arc<dyn StrategyHandle>,
    status: StrategyStatus,
}

#[derive(Default)]
pub struct LifecycleRegistry {
    entries: RwLock<HashMap<StrategyKey, Entry>>,
    gates: Mutex<HashMap<StrategyKey, Arc<Mutex<()>>>>,
}

impl LifecycleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    async fn gate(&self, key: &StrategyKey) -> OwnedMutexGuard<()> {
        let gate = {
            let mut gates = self.gates.lock().await;
            Arc::clone(gates.entry(key.clone()).or_default())
        };
        gate.lock_owned().await
    }

    async fn handle(&self, key: &StrategyKey) -> Option<(Arc<dyn StrategyHandle>, StrategyStatus)> {
        self.entries
            .read()
            .await
            .get(key)
            .map(|entry| (Arc::clone(&entry.handle), entry.status))
    }

    async fn set_status(&self, key: &StrategyKey, status: StrategyStatus) {
        if let Some(entry) = self.entries.write().await.get_mut(key) {
            entry.status = status;
        }
    }

    /// Start `handle` under `key` unless a RUNNING handle already exists.
    ///
    /// Returns `true` when the handle's start routine ran.
    pub async fn start(&self, key: StrategyKey, handle: Arc<dyn StrategyHandle>) -> Result<bool> {
        let _gate = self.gate(&key).await;
        if let Some((_, status)) = self.handle(&key).await {
            if status != StrategyStatus::Paused {
                debug!("Strategy {} already {}, start ignored", key, status);
                return Ok(false);
            }
        }

        handle.start().await?;
        info!("🚀 Started strategy {}", key);
        self.entries.write().await.insert(
            key,
            Entry {
                handle,
                status: StrategyStatus::Running,
            },
        );
        Ok(true)
    }

    pub async fn pause(&self, key: &StrategyKey) -> Result<()> {
        let _gate = self.gate(key).await;
        let Some((handle, _)) = self.handle(key).await else {
            return Ok(());
        };
        handle.pause().await?;
        self.set_status(key, StrategyStatus::Paused).await;
        info!("⏸️ Paused strategy {}", key);
        Ok(())
    }

    /// Restart a PAUSED handle in place. No-op for absent or RUNNING keys.
    pub async fn resume(&self, key: &StrategyKey) -> Result<()> {
        let _gate = self.gate(key).await;
        let Some((handle, status)) = self.handle(key).await else {
            return Ok(());
        };
        if status == StrategyStatus::Paused {
            handle.start().await?;
            self.set_status(key, StrategyStatus::Running).await;
            info!("▶️ Resumed strategy {}", key);
        }
        Ok(())
    }

    pub async fn stop(&self, key: &StrategyKey) -> Result<()> {
        let _gate = self.gate(key).await;
        let Some((handle, _)) = self.handle(key).await else {
            return Ok(());
        };
        handle.stop().await?;
        self.entries.write().await.remove(key);
        info!("🛑 Stopped strategy {}", key);
        Ok(())
    }

    pub async fn status(&self, key: &StrategyKey) -> Option<StrategyStatus> {
        self.entries.read().await.get(key).map(|entry| entry.status)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Handle of a scheduler-driven strategy. Its state lives in the store, so
/// starting means create-or-resume and pause/stop have nothing in-process to tear down.
pub struct PersistedHandle<S: Strategy> {
    strategy: Arc<S>,
    command: S::Command,
}

impl<S: Strategy> PersistedHandle<S> {
    pub fn new(strategy: Arc<S>, command: S::Command) -> Self {
        Self { strategy, command }
    }

    pub fn key(&self) -> StrategyKey {
        self.command.key()
    }
}

#[async_trait]
impl<S: Strategy> StrategyHandle for PersistedHandle<S> {
    async fn start(&self) -> Result<()> {
        let row = self.strategy.on_create(self.command.clone()).await?;
        debug!("Strategy {} persisted as {} ({})", self.key(), row.id(), row.status());
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}
