use std::sync::Arc;

use migration::{Migrator, MigratorTrait};
use shared::{get_db_connection, get_redis_client, Config};
use strategy_engine::prelude::*;
use tracing::{info, warn};

/// Everything the process wires together at startup.
pub struct AppState {
    pub hub: Arc<ExchangeHub>,
    pub venues: Vec<Arc<PaperVenue>>,
    pub service: Arc<StrategyService>,
    pub scheduler: Arc<ExecutionScheduler>,
}

impl AppState {
    pub async fn new(config: &Config) -> std::result::Result<Self, anyhow::Error> {
        let hub = Arc::new(ExchangeHub::new());
        let venues = open_paper_venues(&hub, config).await;

        let (arbitrage, market_making, volume) = match &config.database_url {
            Some(url) => {
                let db = get_db_connection(url).await?;
                if config.run_migrations {
                    Migrator::up(&db, None).await?;
                    info!("Database migrations applied");
                }
                let db = Arc::new(db);
                (
                    Arc::new(ArbitrageAlgorithm::new(
                        hub.clone(),
                        Arc::new(SeaArbitrageStore::new(db.clone())),
                    )),
                    Arc::new(MarketMakingAlgorithm::new(
                        hub.clone(),
                        Arc::new(SeaMarketMakingStore::new(db.clone())),
                    )),
                    Arc::new(VolumeAlgorithm::new(hub.clone(), Arc::new(SeaVolumeStore::new(db)))),
                )
            }
            None => {
                warn!("DATABASE_URL not set, strategies are kept in memory only");
                (
                    Arc::new(ArbitrageAlgorithm::new(
                        hub.clone(),
                        Arc::new(MemoryStrategyStore::<ArbitrageStrategy>::new()),
                    )),
                    Arc::new(MarketMakingAlgorithm::new(
                        hub.clone(),
                        Arc::new(MemoryStrategyStore::<MarketMakingStrategy>::new()),
                    )),
                    Arc::new(VolumeAlgorithm::new(
                        hub.clone(),
                        Arc::new(MemoryStrategyStore::<VolumeStrategy>::new()),
                    )),
                )
            }
        };

        let lock: Arc<dyn TickLock> = match &config.redis_url {
            Some(url) => {
                info!("Using redis tick lock {}", config.tick_lock_key);
                Arc::new(RedisTickLock::new(
                    get_redis_client(url)?,
                    config.tick_lock_key.clone(),
                    config.tick_lock_ttl_ms,
                ))
            }
            None => {
                warn!("REDIS_URL not set, tick lock is local to this process");
                Arc::new(LocalTickLock)
            }
        };

        let scheduler = Arc::new(ExecutionScheduler::new(
            vec![
                arbitrage.clone() as Arc<dyn TickTarget>,
                market_making.clone() as Arc<dyn TickTarget>,
                volume.clone() as Arc<dyn TickTarget>,
            ],
            Arc::new(SystemClock),
            lock,
        ));
        let service = Arc::new(StrategyService::new(
            Arc::new(LifecycleRegistry::new()),
            arbitrage,
            market_making,
            volume,
        ));

        Ok(AppState {
            hub,
            venues,
            service,
            scheduler,
        })
    }
}

/// Open one paper venue per configured exchange with a default and an additional account.
async fn open_paper_venues(hub: &ExchangeHub, config: &Config) -> Vec<Arc<PaperVenue>> {
    let mut venues = Vec::with_capacity(config.paper_exchanges.len());
    for name in &config.paper_exchanges {
        let venue = PaperVenue::new(name.to_lowercase());
        for pair in &config.paper_pairs {
            venue.list_market(pair, 4, 2);
            venue.set_ticker(pair, config.paper_start_price);
        }
        hub.register(AccountLabel::Default, venue.account(AccountLabel::Default)).await;
        hub.register(AccountLabel::Additional, venue.account(AccountLabel::Additional)).await;
        venues.push(venue);
    }
    venues
}
