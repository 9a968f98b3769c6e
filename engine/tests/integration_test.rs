//! Integration tests for the scheduler, lifecycle registry, service and algorithms

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use strategy_engine::prelude::*;

const PAIR: &str = "BTC/USDT";

fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

fn venue(name: &str) -> Arc<PaperVenue> {
    let venue = PaperVenue::new(name);
    venue.list_market(PAIR, 4, 2);
    venue.list_market("ETH/USDT", 4, 2);
    venue.set_order_book(
        PAIR,
        OrderBook::from_levels(&[(dec!(99), dec!(10))], &[(dec!(101), dec!(10))]),
    );
    venue.set_ticker(PAIR, dec!(100));
    venue
}

struct Harness {
    binance: Arc<PaperVenue>,
    okx: Arc<PaperVenue>,
    hub: Arc<ExchangeHub>,
    arbitrage_store: Arc<MemoryStrategyStore<ArbitrageStrategy>>,
    market_making_store: Arc<MemoryStrategyStore<MarketMakingStrategy>>,
    volume_store: Arc<MemoryStrategyStore<VolumeStrategy>>,
    service: StrategyService,
    clock: Arc<ManualClock>,
    scheduler: ExecutionScheduler,
}

async fn harness() -> Harness {
    let binance = venue("binance");
    let okx = venue("okx");
    let hub = Arc::new(ExchangeHub::new());
    for venue in [&binance, &okx] {
        hub.register(AccountLabel::Default, venue.account(AccountLabel::Default)).await;
        hub.register(AccountLabel::Additional, venue.account(AccountLabel::Additional)).await;
    }

    let arbitrage_store = Arc::new(MemoryStrategyStore::<ArbitrageStrategy>::new());
    let market_making_store = Arc::new(MemoryStrategyStore::<MarketMakingStrategy>::new());
    let volume_store = Arc::new(MemoryStrategyStore::<VolumeStrategy>::new());

    let arbitrage = Arc::new(ArbitrageAlgorithm::new(hub.clone(), arbitrage_store.clone()));
    let market_making = Arc::new(MarketMakingAlgorithm::new(hub.clone(), market_making_store.clone()));
    let volume = Arc::new(VolumeAlgorithm::new(hub.clone(), volume_store.clone()));

    let service = StrategyService::new(
        Arc::new(LifecycleRegistry::new()),
        arbitrage.clone(),
        market_making.clone(),
        volume.clone(),
    );

    let clock = Arc::new(ManualClock::new(start_time()));
    let targets = vec![
        arbitrage as Arc<dyn TickTarget>,
        market_making as Arc<dyn TickTarget>,
        volume as Arc<dyn TickTarget>,
    ];
    let scheduler = ExecutionScheduler::new(targets, clock.clone(), Arc::new(LocalTickLock));

    Harness {
        binance,
        okx,
        hub,
        arbitrage_store,
        market_making_store,
        volume_store,
        service,
        clock,
        scheduler,
    }
}

fn market_making_command(user_id: &str, client_id: &str) -> MarketMakingCommand {
    MarketMakingCommand {
        user_id: user_id.to_string(),
        client_id: client_id.to_string(),
        side_a: "BTC".to_string(),
        side_b: "USDT".to_string(),
        exchange_name: "binance".to_string(),
        oracle_exchange_name: None,
        bid_spread: dec!(0.01),
        ask_spread: dec!(0.01),
        order_amount: dec!(1),
        number_of_layers: 2,
        amount_change_type: AmountChangeType::Fixed,
        amount_change_per_layer: dec!(1),
        price_source_type: PriceSourceType::Mid,
        ceiling_price: None,
        floor_price: None,
        check_interval_seconds: 10,
        max_open_orders: None,
    }
}

fn volume_row(id: u64, trades_executed: u32, num_total_trades: u32) -> VolumeStrategy {
    VolumeStrategy {
        id,
        user_id: format!("user-{}", id),
        client_id: format!("vol-{}", id),
        side_a: "BTC".to_string(),
        side_b: "USDT".to_string(),
        exchange_name: "binance".to_string(),
        increment_percentage: dec!(1),
        price_push_rate: dec!(0.5),
        amount_to_trade: dec!(1),
        num_total_trades,
        trades_executed,
        current_maker_price: None,
        check_interval_seconds: 10,
        state: RuntimeState::new(StrategyStatus::Running),
    }
}

fn volume_rows() -> Arc<MemoryStrategyStore<VolumeStrategy>> {
    Arc::new(MemoryStrategyStore::new())
}

// ---------------------------------------------------------------------------
// Lifecycle registry
// ---------------------------------------------------------------------------

#[derive(Default)]
struct CountingHandle {
    starts: AtomicUsize,
    pauses: AtomicUsize,
    stops: AtomicUsize,
}

#[async_trait]
impl StrategyHandle for CountingHandle {
    async fn start(&self) -> Result<()> {
        tokio::time::sleep(StdDuration::from_millis(10)).await;
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let registry = Arc::new(LifecycleRegistry::new());
    let handle = Arc::new(CountingHandle::default());
    let key = StrategyKey::new(StrategyKind::MarketMaking, "user-1", "mm-1");

    let (first, second) = tokio::join!(
        registry.start(key.clone(), handle.clone()),
        registry.start(key.clone(), handle.clone())
    );
    assert!(first.unwrap() ^ second.unwrap());
    assert!(!registry.start(key.clone(), handle.clone()).await.unwrap());

    assert_eq!(handle.starts.load(Ordering::SeqCst), 1);
    assert_eq!(registry.status(&key).await, Some(StrategyStatus::Running));
}

/// Start blocks until released, reporting when it has begun.
struct GatedHandle {
    entered: tokio::sync::Notify,
    release: tokio::sync::Notify,
}

#[async_trait]
impl StrategyHandle for GatedHandle {
    async fn start(&self) -> Result<()> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_slow_start_does_not_block_other_keys() {
    let registry = Arc::new(LifecycleRegistry::new());
    let slow = Arc::new(GatedHandle {
        entered: tokio::sync::Notify::new(),
        release: tokio::sync::Notify::new(),
    });
    let slow_key = StrategyKey::new(StrategyKind::Arbitrage, "user-1", "arb-1");

    let pending = tokio::spawn({
        let registry = registry.clone();
        let slow = slow.clone();
        let key = slow_key.clone();
        async move { registry.start(key, slow).await }
    });
    slow.entered.notified().await;

    let other = Arc::new(CountingHandle::default());
    let other_key = StrategyKey::new(StrategyKind::Volume, "user-2", "vol-2");
    let started = tokio::time::timeout(
        StdDuration::from_secs(1),
        registry.start(other_key.clone(), other.clone()),
    )
    .await
    .expect("start of an unrelated key waited on the slow one");
    assert!(started.unwrap());
    assert_eq!(registry.status(&other_key).await, Some(StrategyStatus::Running));
    assert_eq!(registry.status(&slow_key).await, None);
    registry.pause(&other_key).await.unwrap();

    slow.release.notify_one();
    assert!(pending.await.unwrap().unwrap());
    assert_eq!(registry.status(&slow_key).await, Some(StrategyStatus::Running));
    assert_eq!(registry.len().await, 2);
}

#[tokio::test]
async fn test_pause_then_resume_through_start() {
    let registry = LifecycleRegistry::new();
    let handle = Arc::new(CountingHandle::default());
    let key = StrategyKey::new(StrategyKind::Arbitrage, "user-1", "arb-1");

    registry.start(key.clone(), handle.clone()).await.unwrap();
    registry.pause(&key).await.unwrap();
    assert_eq!(registry.status(&key).await, Some(StrategyStatus::Paused));
    assert_eq!(handle.pauses.load(Ordering::SeqCst), 1);

    assert!(registry.start(key.clone(), handle.clone()).await.unwrap());
    assert_eq!(registry.status(&key).await, Some(StrategyStatus::Running));
    assert_eq!(handle.starts.load(Ordering::SeqCst), 2);

    registry.stop(&key).await.unwrap();
    assert_eq!(registry.status(&key).await, None);
    assert_eq!(handle.stops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_pause_and_stop_of_unknown_key_are_noops() {
    let registry = LifecycleRegistry::new();
    let key = StrategyKey::new(StrategyKind::Volume, "nobody", "none");
    registry.pause(&key).await.unwrap();
    registry.stop(&key).await.unwrap();
    assert!(registry.is_empty().await);
}

// ---------------------------------------------------------------------------
// Scheduler with a scripted strategy
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Behaviour {
    Fail,
    Panic,
    Sleep(u64),
}

struct ScriptedStrategy {
    hub: Arc<ExchangeHub>,
    store: Arc<dyn StrategyStore<VolumeStrategy>>,
    behaviour: HashMap<u64, Behaviour>,
    evaluated: Mutex<Vec<u64>>,
}

impl ScriptedStrategy {
    fn new(store: Arc<MemoryStrategyStore<VolumeStrategy>>, behaviour: HashMap<u64, Behaviour>) -> Self {
        Self {
            hub: Arc::new(ExchangeHub::new()),
            store,
            behaviour,
            evaluated: Mutex::new(Vec::new()),
        }
    }

    fn evaluated(&self) -> Vec<u64> {
        self.evaluated.lock().unwrap().clone()
    }
}

#[async_trait]
impl Strategy for ScriptedStrategy {
    type Row = VolumeStrategy;
    type Command = VolumeCommand;

    fn store(&self) -> &Arc<dyn StrategyStore<VolumeStrategy>> {
        &self.store
    }

    fn hub(&self) -> &Arc<ExchangeHub> {
        &self.hub
    }

    async fn prepare(&self, _command: &VolumeCommand) -> Result<VolumeStrategy> {
        Err(EngineError::InvalidCommand("scripted".to_string()))
    }

    async fn evaluate(&self, row: &VolumeStrategy) -> Result<()> {
        self.evaluated.lock().unwrap().push(row.id);
        match self.behaviour.get(&row.id).copied() {
            Some(Behaviour::Fail) => Err(EngineError::Exchange("boom".to_string())),
            Some(Behaviour::Panic) => panic!("scripted panic"),
            Some(Behaviour::Sleep(ms)) => {
                tokio::time::sleep(StdDuration::from_millis(ms)).await;
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn on_teardown(&self, _row: &VolumeStrategy) -> Result<usize> {
        Ok(0)
    }
}

fn scripted_scheduler(strategy: Arc<ScriptedStrategy>, clock: Arc<ManualClock>) -> ExecutionScheduler {
    ExecutionScheduler::new(vec![strategy as Arc<dyn TickTarget>], clock, Arc::new(LocalTickLock))
}

#[tokio::test]
async fn test_failure_is_isolated_to_its_row() {
    let store = volume_rows();
    for id in 1..=3 {
        store.insert(volume_row(id, 0, 10)).await;
    }
    let strategy = Arc::new(ScriptedStrategy::new(
        store.clone(),
        HashMap::from([(2, Behaviour::Fail)]),
    ));
    let clock = Arc::new(ManualClock::new(start_time()));
    let scheduler = scripted_scheduler(strategy.clone(), clock.clone());

    let outcome = scheduler.tick().await;
    let report = outcome.report(StrategyKind::Volume).unwrap();
    assert_eq!(report.evaluated, 3);
    assert_eq!(report.failed, 1);
    assert_eq!(strategy.evaluated(), vec![1, 2, 3]);

    for id in [1, 3] {
        let row = store.find_by_id(id, None).await.unwrap().unwrap();
        assert_eq!(row.status(), StrategyStatus::Running);
        assert_eq!(row.state.last_trading_attempt_at, Some(start_time()));
        assert_eq!(row.state.paused_reason, None);
    }
    let failed = store.find_by_id(2, None).await.unwrap().unwrap();
    assert_eq!(failed.status(), StrategyStatus::Paused);
    assert_eq!(failed.state.paused_reason.as_deref(), Some("exchange error: boom"));
    assert_eq!(failed.state.last_trading_attempt_at, Some(start_time()));

    // The paused row is not picked up again.
    clock.advance(Duration::seconds(60));
    scheduler.tick().await;
    assert_eq!(strategy.evaluated(), vec![1, 2, 3, 1, 3]);
}

#[tokio::test]
async fn test_panic_pauses_the_row() {
    let store = volume_rows();
    store.insert(volume_row(1, 0, 10)).await;
    store.insert(volume_row(2, 0, 10)).await;
    let strategy = Arc::new(ScriptedStrategy::new(
        store.clone(),
        HashMap::from([(1, Behaviour::Panic)]),
    ));
    let scheduler = scripted_scheduler(strategy.clone(), Arc::new(ManualClock::new(start_time())));

    scheduler.tick().await;

    let panicked = store.find_by_id(1, None).await.unwrap().unwrap();
    assert_eq!(panicked.status(), StrategyStatus::Paused);
    assert_eq!(panicked.state.paused_reason.as_deref(), Some(PANIC_REASON));
    let sibling = store.find_by_id(2, None).await.unwrap().unwrap();
    assert_eq!(sibling.status(), StrategyStatus::Running);
    assert!(!scheduler.is_ticking());
}

#[tokio::test]
async fn test_interval_gating() {
    let store = volume_rows();
    let last = start_time() - Duration::seconds(5);

    let mut slow = volume_row(1, 0, 10);
    slow.check_interval_seconds = 10;
    slow.state.last_trading_attempt_at = Some(last);
    let mut fast = volume_row(2, 0, 10);
    fast.check_interval_seconds = 5;
    fast.state.last_trading_attempt_at = Some(last);
    store.insert(slow).await;
    store.insert(fast).await;

    let strategy = Arc::new(ScriptedStrategy::new(store.clone(), HashMap::new()));
    let clock = Arc::new(ManualClock::new(start_time()));
    let scheduler = scripted_scheduler(strategy.clone(), clock.clone());

    let outcome = scheduler.tick().await;
    let report = outcome.report(StrategyKind::Volume).unwrap();
    assert_eq!((report.evaluated, report.not_due), (1, 1));
    assert_eq!(strategy.evaluated(), vec![2]);

    let slow = store.find_by_id(1, None).await.unwrap().unwrap();
    assert_eq!(slow.state.last_trading_attempt_at, Some(last));
    let fast = store.find_by_id(2, None).await.unwrap().unwrap();
    assert_eq!(fast.state.last_trading_attempt_at, Some(start_time()));

    clock.advance(Duration::seconds(5));
    scheduler.tick().await;
    assert_eq!(strategy.evaluated(), vec![2, 1, 2]);
}

#[tokio::test]
async fn test_overlapping_tick_is_skipped() {
    let store = volume_rows();
    store.insert(volume_row(1, 0, 10)).await;
    let strategy = Arc::new(ScriptedStrategy::new(
        store.clone(),
        HashMap::from([(1, Behaviour::Sleep(300))]),
    ));
    let scheduler = Arc::new(scripted_scheduler(
        strategy.clone(),
        Arc::new(ManualClock::new(start_time())),
    ));

    let running = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.tick().await })
    };
    tokio::time::sleep(StdDuration::from_millis(50)).await;
    assert!(scheduler.is_ticking());
    assert_eq!(scheduler.tick().await, TickOutcome::Skipped(SkipReason::InProgress));

    let first = running.await.unwrap();
    assert_eq!(first.report(StrategyKind::Volume).unwrap().evaluated, 1);
    assert_eq!(strategy.evaluated(), vec![1]);
}

struct HeldElsewhere;

#[async_trait]
impl TickLock for HeldElsewhere {
    async fn acquire(&self) -> Result<Option<LockToken>> {
        Ok(None)
    }

    async fn release(&self, _token: LockToken) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_held_lock_skips_tick() {
    let store = volume_rows();
    store.insert(volume_row(1, 0, 10)).await;
    let strategy = Arc::new(ScriptedStrategy::new(store, HashMap::new()));
    let scheduler = ExecutionScheduler::new(
        vec![strategy.clone() as Arc<dyn TickTarget>],
        Arc::new(ManualClock::new(start_time())),
        Arc::new(HeldElsewhere),
    );

    assert_eq!(scheduler.tick().await, TickOutcome::Skipped(SkipReason::LockHeld));
    assert!(strategy.evaluated().is_empty());
}

#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let store = volume_rows();
    store.insert(volume_row(1, 0, 10)).await;
    let strategy = Arc::new(ScriptedStrategy::new(store, HashMap::new()));
    let scheduler = Arc::new(scripted_scheduler(
        strategy.clone(),
        Arc::new(ManualClock::new(start_time())),
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let runner = tokio::spawn(
        scheduler
            .clone()
            .run(IntervalTicker::new(StdDuration::from_millis(20)), shutdown_rx),
    );
    tokio::time::sleep(StdDuration::from_millis(100)).await;
    shutdown_tx.send(true).unwrap();
    runner.await.unwrap();

    // Clock never moves, so only the first tick found the row due.
    assert_eq!(strategy.evaluated(), vec![1]);
}

// ---------------------------------------------------------------------------
// Algorithms and service on the paper venue
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_volume_trade_then_completion() {
    let h = harness().await;
    h.volume_store.insert(volume_row(1, 0, 2)).await;

    h.scheduler.tick().await;
    let row = h.volume_store.find_by_id(1, None).await.unwrap().unwrap();
    assert_eq!(row.trades_executed, 1);
    // mid 100 pushed by 1% lands on the ask and is pulled one tick below it
    assert_eq!(row.current_maker_price, Some(dec!(100.99)));
    assert_eq!(row.status(), StrategyStatus::Running);

    let orders = h.binance.orders();
    assert_eq!(orders.len(), 2);
    assert!(orders.iter().all(|o| o.status.is_filled()));
    // the maker rested before the taker filled it, and is no longer tracked
    assert!(h.hub.tracked_orders("binance", PAIR, "user-1").await.is_empty());

    h.clock.advance(Duration::seconds(10));
    h.scheduler.tick().await;
    let row = h.volume_store.find_by_id(1, None).await.unwrap().unwrap();
    assert_eq!(row.trades_executed, 2);

    h.clock.advance(Duration::seconds(10));
    h.scheduler.tick().await;
    let row = h.volume_store.find_by_id(1, None).await.unwrap().unwrap();
    assert_eq!(row.status(), StrategyStatus::Deleted);
    assert_eq!(row.trades_executed, 2);

    h.clock.advance(Duration::seconds(10));
    let outcome = h.scheduler.tick().await;
    assert_eq!(outcome.report(StrategyKind::Volume).unwrap().evaluated, 0);
    assert_eq!(h.binance.orders().len(), 4);
    assert!(h.hub.tracked_orders("binance", PAIR, "user-1").await.is_empty());
}

async fn rest_buy_for(h: &Harness, user_id: &str, client_id: &str) -> Order {
    let owner = OrderOwner { user_id, client_id };
    h.hub
        .place_order(
            "binance",
            AccountLabel::Default,
            owner,
            OrderRequest::limit(PAIR, OrderSide::Buy, dec!(1), dec!(95)),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_volume_completion_cancels_leftover_orders() {
    let h = harness().await;
    let resting = rest_buy_for(&h, "user-1", "vol-1").await;
    assert!(resting.status.is_open());
    h.volume_store.insert(volume_row(1, 2, 2)).await;

    h.scheduler.tick().await;

    let row = h.volume_store.find_by_id(1, None).await.unwrap().unwrap();
    assert_eq!(row.status(), StrategyStatus::Deleted);
    assert!(h.binance.open_orders(PAIR).is_empty());
    assert_eq!(h.binance.orders()[0].status, OrderStatus::Canceled);
    assert!(h.hub.tracked_orders("binance", PAIR, "user-1").await.is_empty());
}

#[tokio::test]
async fn test_volume_completion_pauses_when_cancellation_fails() {
    let h = harness().await;
    rest_buy_for(&h, "user-1", "vol-1").await;
    h.volume_store.insert(volume_row(1, 2, 2)).await;

    h.binance.fail_next(PaperOp::FetchOrder, "venue down");
    h.scheduler.tick().await;

    let row = h.volume_store.find_by_id(1, None).await.unwrap().unwrap();
    assert_eq!(row.status(), StrategyStatus::Paused);
    assert_eq!(row.state.paused_reason.as_deref(), Some("exchange error: venue down"));
    assert_eq!(h.binance.open_orders(PAIR).len(), 1);
    assert_eq!(h.hub.tracked_orders("binance", PAIR, "user-1").await.len(), 1);
}

#[tokio::test]
async fn test_completed_volume_row_is_soft_deleted() {
    let h = harness().await;
    h.volume_store.insert(volume_row(7, 5, 5)).await;

    h.scheduler.tick().await;

    let row = h.volume_store.find_by_id(7, None).await.unwrap().unwrap();
    assert_eq!(row.status(), StrategyStatus::Deleted);
    assert!(h.binance.orders().is_empty());
}

#[tokio::test]
async fn test_volume_pauses_on_one_sided_book() {
    let h = harness().await;
    h.binance.set_order_book(PAIR, OrderBook::from_levels(&[(dec!(99), dec!(1))], &[]));
    h.volume_store.insert(volume_row(1, 0, 5)).await;

    h.scheduler.tick().await;

    let row = h.volume_store.find_by_id(1, None).await.unwrap().unwrap();
    assert_eq!(row.status(), StrategyStatus::Paused);
    assert_eq!(row.trades_executed, 0);
    assert_eq!(
        row.state.paused_reason.as_deref(),
        Some("order book for BTC/USDT on binance is empty")
    );
}

#[tokio::test]
async fn test_arbitrage_buys_cheap_and_sells_dear() {
    let h = harness().await;
    h.binance.set_order_book(
        PAIR,
        OrderBook::from_levels(&[(dec!(99), dec!(5))], &[(dec!(100), dec!(5))]),
    );
    h.okx.set_order_book(
        PAIR,
        OrderBook::from_levels(&[(dec!(103), dec!(5))], &[(dec!(104), dec!(5))]),
    );

    let command = ArbitrageCommand::try_from(ArbitrageRequest {
        user_id: "user-1".to_string(),
        client_id: "arb-1".to_string(),
        pair: "BTC/USDT:USDT".to_string(),
        exchange_a_name: "binance".to_string(),
        exchange_b_name: "okx".to_string(),
        amount_to_trade: "1".to_string(),
        min_profitability: "0.01".to_string(),
        check_interval_seconds: Some(5),
        max_open_orders: None,
    })
    .unwrap();
    let row = h.service.create_arbitrage(command).await.unwrap();
    assert_eq!(row.status(), StrategyStatus::Running);

    h.scheduler.tick().await;

    let bought = h.binance.orders();
    assert_eq!(bought.len(), 1);
    assert_eq!(bought[0].side, OrderSide::Buy);
    assert_eq!(bought[0].price, Some(dec!(100)));
    assert!(bought[0].status.is_filled());

    let sold = h.okx.orders();
    assert_eq!(sold.len(), 1);
    assert_eq!(sold[0].side, OrderSide::Sell);
    assert_eq!(sold[0].price, Some(dec!(103)));

    let stored = h.arbitrage_store.find_by_id(row.id, None).await.unwrap().unwrap();
    assert_eq!(stored.state.last_trading_attempt_at, Some(start_time()));
}

#[tokio::test]
async fn test_arbitrage_reverse_direction_and_no_trade() {
    let h = harness().await;
    h.binance.set_order_book(
        PAIR,
        OrderBook::from_levels(&[(dec!(103), dec!(5))], &[(dec!(104), dec!(5))]),
    );
    h.okx.set_order_book(
        PAIR,
        OrderBook::from_levels(&[(dec!(99), dec!(5))], &[(dec!(100), dec!(5))]),
    );
    let command = ArbitrageCommand {
        user_id: "user-1".to_string(),
        client_id: "arb-1".to_string(),
        side_a: "BTC".to_string(),
        side_b: "USDT".to_string(),
        exchange_a_name: "binance".to_string(),
        exchange_b_name: "okx".to_string(),
        amount_to_trade: dec!(1),
        min_profitability: dec!(0.01),
        check_interval_seconds: 5,
        max_open_orders: None,
    };
    h.service.create_arbitrage(command.clone()).await.unwrap();

    h.scheduler.tick().await;
    assert_eq!(h.okx.orders()[0].side, OrderSide::Buy);
    assert_eq!(h.binance.orders()[0].side, OrderSide::Sell);

    // Spread too thin in both directions
    h.binance.set_order_book(
        PAIR,
        OrderBook::from_levels(&[(dec!(100), dec!(5))], &[(dec!(100.5), dec!(5))]),
    );
    h.okx.set_order_book(
        PAIR,
        OrderBook::from_levels(&[(dec!(100), dec!(5))], &[(dec!(100.5), dec!(5))]),
    );
    h.clock.advance(Duration::seconds(5));
    h.scheduler.tick().await;
    assert_eq!(h.okx.orders().len(), 1);
    assert_eq!(h.binance.orders().len(), 1);
}

#[tokio::test]
async fn test_arbitrage_order_cap_counts_only_open_orders() {
    let h = harness().await;
    h.binance.set_order_book(
        PAIR,
        OrderBook::from_levels(&[(dec!(98), dec!(1))], &[(dec!(100), dec!(1)), (dec!(102), dec!(1))]),
    );
    h.okx.set_order_book(
        PAIR,
        OrderBook::from_levels(&[(dec!(104), dec!(1)), (dec!(102), dec!(1))], &[(dec!(106), dec!(1))]),
    );
    let command = ArbitrageCommand {
        user_id: "user-1".to_string(),
        client_id: "arb-1".to_string(),
        side_a: "BTC".to_string(),
        side_b: "USDT".to_string(),
        exchange_a_name: "binance".to_string(),
        exchange_b_name: "okx".to_string(),
        amount_to_trade: dec!(2),
        min_profitability: dec!(0.01),
        check_interval_seconds: 5,
        max_open_orders: Some(2),
    };
    h.service.create_arbitrage(command).await.unwrap();

    // VWAP 101 against 103: each leg takes one level and rests the rest
    h.scheduler.tick().await;
    assert_eq!(h.binance.orders()[0].price, Some(dec!(101)));
    assert_eq!(h.okx.orders()[0].price, Some(dec!(103)));
    assert_eq!(h.binance.open_orders(PAIR).len(), 1);
    assert_eq!(h.okx.open_orders(PAIR).len(), 1);

    h.clock.advance(Duration::seconds(5));
    h.scheduler.tick().await;
    assert_eq!(h.binance.orders().len(), 1);
    assert_eq!(h.okx.orders().len(), 1);

    // Counterparties take the rest of both legs
    h.binance
        .account(AccountLabel::Additional)
        .create_order(OrderRequest::limit(PAIR, OrderSide::Sell, dec!(1), dec!(101)))
        .await
        .unwrap();
    h.okx
        .account(AccountLabel::Additional)
        .create_order(OrderRequest::limit(PAIR, OrderSide::Buy, dec!(1), dec!(103)))
        .await
        .unwrap();
    assert!(h.binance.orders()[0].status.is_filled());
    assert!(h.okx.orders()[0].status.is_filled());

    h.clock.advance(Duration::seconds(5));
    h.scheduler.tick().await;
    assert_eq!(h.binance.orders().len(), 3);
    assert_eq!(h.okx.orders().len(), 3);
    assert_eq!(h.hub.tracked_orders("binance", PAIR, "user-1").await.len(), 1);
    assert_eq!(h.hub.tracked_orders("okx", PAIR, "user-1").await.len(), 1);
}

#[tokio::test]
async fn test_create_rejects_unsupported_market() {
    let h = harness().await;
    let mut command = ArbitrageCommand {
        user_id: "user-1".to_string(),
        client_id: "arb-1".to_string(),
        side_a: "BTC".to_string(),
        side_b: "USDT".to_string(),
        exchange_a_name: "binance".to_string(),
        exchange_b_name: "kraken".to_string(),
        amount_to_trade: dec!(1),
        min_profitability: dec!(0.01),
        check_interval_seconds: 5,
        max_open_orders: None,
    };
    let err = h.service.create_arbitrage(command.clone()).await.unwrap_err();
    assert!(matches!(err, EngineError::UnsupportedExchange(ref name) if name == "kraken"));

    command.exchange_b_name = "okx".to_string();
    command.side_a = "DOGE".to_string();
    let err = h.service.create_arbitrage(command).await.unwrap_err();
    assert!(matches!(err, EngineError::UnsupportedPair { .. }));
    assert!(err.is_validation());
    assert!(h.arbitrage_store.all().await.is_empty());
    assert!(h.service.registry().is_empty().await);
}

#[tokio::test]
async fn test_market_making_places_layers() {
    let h = harness().await;
    let row = h
        .service
        .create_market_making(market_making_command("user-1", "mm-1"))
        .await
        .unwrap();
    assert_eq!(row.start_price, Some(dec!(100)));

    h.scheduler.tick().await;

    let open = h.binance.open_orders(PAIR);
    let mut quotes: Vec<(OrderSide, Decimal, Decimal)> = open
        .iter()
        .map(|o| (o.side, o.price.unwrap_or_default(), o.amount))
        .collect();
    quotes.sort_by(|a, b| a.1.cmp(&b.1));
    assert_eq!(
        quotes,
        vec![
            (OrderSide::Buy, dec!(98), dec!(2)),
            (OrderSide::Buy, dec!(99), dec!(1)),
            (OrderSide::Sell, dec!(101), dec!(1)),
            (OrderSide::Sell, dec!(102), dec!(2)),
        ]
    );
    assert_eq!(h.hub.tracked_orders("binance", PAIR, "user-1").await.len(), 4);
}

#[tokio::test]
async fn test_market_making_respects_ceiling_and_order_cap() {
    let h = harness().await;
    let mut command = market_making_command("user-1", "mm-1");
    command.ceiling_price = Some(dec!(90));
    command.number_of_layers = 3;
    command.max_open_orders = Some(2);
    h.service.create_market_making(command).await.unwrap();

    h.scheduler.tick().await;

    let open = h.binance.open_orders(PAIR);
    assert_eq!(open.len(), 2);
    assert!(open.iter().all(|o| o.side == OrderSide::Sell));
}

#[tokio::test]
async fn test_market_making_uses_oracle_exchange() {
    let h = harness().await;
    h.okx.set_order_book(
        PAIR,
        OrderBook::from_levels(&[(dec!(199), dec!(1))], &[(dec!(201), dec!(1))]),
    );
    let mut command = market_making_command("user-1", "mm-1");
    command.number_of_layers = 1;
    command.oracle_exchange_name = Some("okx".to_string());
    command.price_source_type = PriceSourceType::BestBid;
    h.service.create_market_making(command).await.unwrap();

    h.scheduler.tick().await;

    let mut prices: Vec<Decimal> = h
        .binance
        .orders()
        .iter()
        .filter_map(|o| o.price)
        .collect();
    prices.sort();
    // quotes centre on okx's best bid; the buy at 197.01 takes binance's ask
    assert_eq!(prices, vec![dec!(197.01), dec!(200.99)]);
    assert!(h.okx.orders().is_empty());
}

#[tokio::test]
async fn test_market_making_pauses_on_empty_book() {
    let h = harness().await;
    let mut command = market_making_command("user-2", "mm-eth");
    command.side_a = "ETH".to_string();
    h.service.create_market_making(command).await.unwrap();

    h.scheduler.tick().await;

    let row = h.market_making_store.all().await.pop().unwrap();
    assert_eq!(row.status(), StrategyStatus::Paused);
    assert_eq!(
        row.state.paused_reason.as_deref(),
        Some("order book for ETH/USDT on binance is empty")
    );
}

#[tokio::test]
async fn test_service_pause_resume_and_recreate() {
    let h = harness().await;
    let command = market_making_command("user-1", "mm-1");
    let row = h.service.create_market_making(command.clone()).await.unwrap();

    let again = h.service.create_market_making(command.clone()).await.unwrap();
    assert_eq!(again.id, row.id);
    assert_eq!(h.market_making_store.all().await.len(), 1);

    let status = h
        .service
        .pause(StrategyKind::MarketMaking, "user-1", row.id)
        .await
        .unwrap();
    assert_eq!(status, StrategyStatus::Paused);
    let paused = h.market_making_store.find_by_id(row.id, None).await.unwrap().unwrap();
    assert_eq!(paused.state.paused_reason.as_deref(), Some(PAUSED_BY_USER));

    // Start again with the same request resumes the same row.
    let resumed = h.service.create_market_making(command).await.unwrap();
    assert_eq!(resumed.id, row.id);
    assert_eq!(resumed.status(), StrategyStatus::Running);
    assert_eq!(resumed.state.paused_reason, None);

    h.service
        .pause(StrategyKind::MarketMaking, "user-1", row.id)
        .await
        .unwrap();
    let status = h
        .service
        .resume(StrategyKind::MarketMaking, "user-1", row.id)
        .await
        .unwrap();
    assert_eq!(status, StrategyStatus::Running);
    assert_eq!(
        h.service.registry().status(&row.key()).await,
        Some(StrategyStatus::Running)
    );
}

#[tokio::test]
async fn test_stop_cancels_orders_and_delete_is_soft() {
    let h = harness().await;
    let row = h
        .service
        .create_market_making(market_making_command("user-1", "mm-1"))
        .await
        .unwrap();
    h.scheduler.tick().await;
    assert_eq!(h.binance.open_orders(PAIR).len(), 4);

    let status = h
        .service
        .stop(StrategyKind::MarketMaking, "user-1", row.id)
        .await
        .unwrap();
    assert_eq!(status, StrategyStatus::Stopped);
    assert!(h.binance.open_orders(PAIR).is_empty());
    assert_eq!(h.service.registry().status(&row.key()).await, None);

    h.clock.advance(Duration::seconds(60));
    let outcome = h.scheduler.tick().await;
    assert_eq!(outcome.report(StrategyKind::MarketMaking).unwrap().evaluated, 0);

    h.service
        .delete(StrategyKind::MarketMaking, "user-1", row.id)
        .await
        .unwrap();
    let deleted = h.market_making_store.find_by_id(row.id, None).await.unwrap().unwrap();
    assert_eq!(deleted.status(), StrategyStatus::Deleted);

    let err = h
        .service
        .resume(StrategyKind::MarketMaking, "user-1", row.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidCommand(_)));
}

#[tokio::test]
async fn test_failed_cancellation_pauses_instead_of_stopping() {
    let h = harness().await;
    let row = h
        .service
        .create_market_making(market_making_command("user-1", "mm-1"))
        .await
        .unwrap();
    h.scheduler.tick().await;

    h.binance.fail_next(PaperOp::FetchOrder, "venue down");
    let err = h
        .service
        .delete(StrategyKind::MarketMaking, "user-1", row.id)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "exchange error: venue down");

    let stored = h.market_making_store.find_by_id(row.id, None).await.unwrap().unwrap();
    assert_eq!(stored.status(), StrategyStatus::Paused);
    assert_eq!(stored.state.paused_reason.as_deref(), Some("exchange error: venue down"));
}

#[tokio::test]
async fn test_manual_action_on_unknown_strategy() {
    let h = harness().await;
    let row = h
        .service
        .create_market_making(market_making_command("user-1", "mm-1"))
        .await
        .unwrap();

    let err = h
        .service
        .pause(StrategyKind::MarketMaking, "user-2", row.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { kind: StrategyKind::MarketMaking, .. }));

    let err = h.service.stop(StrategyKind::Volume, "user-1", 999).await.unwrap_err();
    assert_eq!(err.to_string(), "volume strategy 999 not found");
}

#[tokio::test]
async fn test_submit_tagged_request() {
    let h = harness().await;
    let request: StrategyRequest = serde_json::from_str(
        r#"{"type":"volume","userId":"user-9","clientId":"vol-9","pair":"BTC/USDT",
            "exchangeName":"binance","incrementPercentage":"1","pricePushRate":"0.5",
            "amountToTrade":"0.5","numTotalTrades":3,"checkIntervalSeconds":30}"#,
    )
    .unwrap();

    let summary = h.service.submit(request).await.unwrap();
    assert_eq!(summary.kind, StrategyKind::Volume);
    assert_eq!(summary.status, StrategyStatus::Running);

    let row = h.volume_store.find_by_id(summary.id, None).await.unwrap().unwrap();
    assert_eq!(row.check_interval_seconds, 30);
    assert_eq!(row.amount_to_trade, dec!(0.5));
}
