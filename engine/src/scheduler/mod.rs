//! Execution scheduler
//!
//! One repeating tick loads every RUNNING row of each strategy kind, evaluates
//! the rows whose interval has elapsed and records the attempt. A failing or
//! panicking row is paused with its error message and never affects the others.
//! Ticks never overlap: an in-process flag guards re-entry and a [`TickLock`]
//! guards against other processes.

mod clock;
mod lock;

pub use clock::{Clock, IntervalTicker, ManualClock, SystemClock, TickSource};
pub use lock::{LocalTickLock, LockToken, RedisTickLock, TickLock};

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::model::{StrategyKind, StrategyRow};
use crate::strategy::Strategy;

/// Paused reason recorded when an evaluation panics.
pub const PANIC_REASON: &str = "evaluation panicked";

/// Whether `row` should be evaluated at `now`.
pub fn is_due<R: StrategyRow>(row: &R, now: DateTime<Utc>) -> bool {
    match row.state().last_trading_attempt_at {
        None => true,
        Some(last) => now >= last + Duration::seconds(i64::from(row.check_interval_seconds())),
    }
}

/// Per-kind counters of one tick. `failed` rows are included in `evaluated`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub kind: StrategyKind,
    pub evaluated: usize,
    pub not_due: usize,
    pub failed: usize,
}

impl TickReport {
    pub fn new(kind: StrategyKind) -> Self {
        Self {
            kind,
            evaluated: 0,
            not_due: 0,
            failed: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The previous tick is still running
    InProgress,
    /// Another process holds the tick lock
    LockHeld,
    /// The tick lock could not be reached
    LockUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Skipped(SkipReason),
    Completed(Vec<TickReport>),
}

impl TickOutcome {
    pub fn report(&self, kind: StrategyKind) -> Option<&TickReport> {
        match self {
            Self::Completed(reports) => reports.iter().find(|r| r.kind == kind),
            Self::Skipped(_) => None,
        }
    }
}

/// One strategy kind as seen by the scheduler.
#[async_trait]
pub trait TickTarget: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Evaluate every RUNNING row that is due at `now`.
    async fn run_due(&self, now: DateTime<Utc>) -> Result<TickReport>;
}

#[async_trait]
impl<S: Strategy> TickTarget for S {
    fn kind(&self) -> StrategyKind {
        <S::Row as StrategyRow>::KIND
    }

    async fn run_due(&self, now: DateTime<Utc>) -> Result<TickReport> {
        let kind = <S::Row as StrategyRow>::KIND;
        let store = self.store();
        let mut report = TickReport::new(kind);

        for row in store.find_running().await? {
            if !is_due(&row, now) {
                report.not_due += 1;
                continue;
            }
            report.evaluated += 1;
            debug!("Evaluating {} strategy {}", kind, row.id());

            let failure = match AssertUnwindSafe(self.evaluate(&row)).catch_unwind().await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(_) => Some(PANIC_REASON.to_string()),
            };

            if let Some(reason) = failure {
                report.failed += 1;
                warn!("⚠️ {} strategy {} paused: {}", kind, row.id(), reason);
                if let Err(e) = store.mark_paused(row.id(), &reason).await {
                    error!("Failed to pause {} strategy {}: {}", kind, row.id(), e);
                }
            }

            if let Err(e) = store.update_last_attempt(row.id(), now).await {
                error!("Failed to record attempt of {} strategy {}: {}", kind, row.id(), e);
            }
        }

        Ok(report)
    }
}

/// Resets the in-progress flag when a tick ends, including by panic.
struct TickGuard<'a>(&'a AtomicBool);

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ExecutionScheduler {
    targets: Vec<Arc<dyn TickTarget>>,
    clock: Arc<dyn Clock>,
    lock: Arc<dyn TickLock>,
    in_progress: AtomicBool,
}

impl ExecutionScheduler {
    pub fn new(
        targets: Vec<Arc<dyn TickTarget>>,
        clock: Arc<dyn Clock>,
        lock: Arc<dyn TickLock>,
    ) -> Self {
        Self {
            targets,
            clock,
            lock,
            in_progress: AtomicBool::new(false),
        }
    }

    pub fn is_ticking(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Run one tick unless one is already in progress or another process holds the lock.
    pub async fn tick(&self) -> TickOutcome {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("⏳ Previous tick still running, skipping");
            return TickOutcome::Skipped(SkipReason::InProgress);
        }
        let _guard = TickGuard(&self.in_progress);

        let token = match self.lock.acquire().await {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("Tick lock held by another instance, skipping");
                return TickOutcome::Skipped(SkipReason::LockHeld);
            }
            Err(e) => {
                error!("Tick lock unavailable, skipping: {}", e);
                return TickOutcome::Skipped(SkipReason::LockUnavailable);
            }
        };

        let now = self.clock.now();
        let results = join_all(
            self.targets
                .iter()
                .map(|target| async move { (target.kind(), target.run_due(now).await) }),
        )
        .await;

        let mut reports = Vec::with_capacity(results.len());
        for (kind, result) in results {
            match result {
                Ok(report) => {
                    if report.evaluated > 0 {
                        info!(
                            "🕐 Tick {}: evaluated {}, failed {}, not due {}",
                            kind, report.evaluated, report.failed, report.not_due
                        );
                    }
                    reports.push(report);
                }
                Err(e) => error!("Loading running {} strategies failed: {}", kind, e),
            }
        }

        if let Err(e) = self.lock.release(token).await {
            warn!("Failed to release tick lock: {}", e);
        }
        TickOutcome::Completed(reports)
    }

    /// Tick on every `ticker` beat until `shutdown` flips to `true`.
    ///
    /// Each tick runs on its own task, so a slow tick is skipped over by the
    /// in-progress guard instead of delaying the ticker.
    pub async fn run<T: TickSource>(self: Arc<Self>, mut ticker: T, mut shutdown: watch::Receiver<bool>) {
        info!("🚀 Execution scheduler started ({} strategy kinds)", self.targets.len());
        let mut last: Option<JoinHandle<TickOutcome>> = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let scheduler = Arc::clone(&self);
                    last = Some(tokio::spawn(async move { scheduler.tick().await }));
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        if let Some(handle) = last {
            if let Err(e) = handle.await {
                error!("Last tick did not finish cleanly: {}", e);
            }
        }
        info!("🛑 Execution scheduler stopped");
    }
}
