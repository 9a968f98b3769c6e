use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use shared::Config;
use strategy_engine::prelude::*;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod feed;
mod state;

use crate::feed::PaperMarketFeed;
use crate::state::AppState;

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Submit every request in the JSON seed file. A bad entry is logged and skipped.
async fn seed_strategies(service: &StrategyService, path: &str) -> Result<()> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read seed file {}", path))?;
    let requests: Vec<StrategyRequest> =
        serde_json::from_str(&raw).with_context(|| format!("Invalid seed file {}", path))?;

    info!("🌱 Seeding {} strategies from {}", requests.len(), path);
    for request in requests {
        match service.submit(request).await {
            Ok(summary) => info!(
                "Seeded {} strategy {} ({}) for user {}: {}",
                summary.kind, summary.id, summary.client_id, summary.user_id, summary.status
            ),
            Err(e) if e.is_validation() => warn!("Rejected seed entry: {}", e),
            Err(e) => error!("Failed to seed strategy: {}", e),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_json);

    info!("Starting strategy engine...");

    let app = AppState::new(&config).await?;
    info!(
        "Paper exchanges ready: {:?}",
        app.hub.supported_exchanges().await
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let feed = PaperMarketFeed::new(
        app.venues.clone(),
        config.paper_pairs.clone(),
        config.paper_start_price,
    );
    let feed_task = tokio::spawn(feed.run(
        Duration::from_millis(config.paper_feed_interval_ms),
        shutdown_rx.clone(),
    ));

    if let Some(path) = &config.seed_file {
        if let Err(e) = seed_strategies(&app.service, path).await {
            error!("Seeding failed: {:#}", e);
        }
    }

    let scheduler_task = tokio::spawn(Arc::clone(&app.scheduler).run(
        IntervalTicker::new(Duration::from_secs(config.tick_interval_secs.max(1))),
        shutdown_rx,
    ));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    let _ = shutdown_tx.send(true);

    if let Err(e) = scheduler_task.await {
        error!("Scheduler task failed: {}", e);
    }
    if let Err(e) = feed_task.await {
        error!("Paper feed task failed: {}", e);
    }

    info!("Strategy engine stopped");
    Ok(())
}
