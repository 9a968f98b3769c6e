use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::commands::VolumeCommand;
use crate::error::{EngineError, Result};
use crate::exchange::{AccountLabel, ExchangeHub, OrderOwner, OrderRequest, OrderSide};
use crate::model::{RuntimeState, StrategyStatus, VolumeStrategy};
use crate::pricing::{clamp_below_ask, default_account_is_maker, jittered_amount, next_maker_price};
use crate::store::{StrategyStore, VolumeStore};
use crate::strategy::Strategy;

/// Trades between a user's default and additional accounts, alternating maker
/// and taker, pushing the maker price a little on each trade.
pub struct VolumeAlgorithm {
    hub: Arc<ExchangeHub>,
    store: Arc<dyn StrategyStore<VolumeStrategy>>,
    trades: Arc<dyn VolumeStore>,
}

impl VolumeAlgorithm {
    pub fn new<S: VolumeStore + 'static>(hub: Arc<ExchangeHub>, store: Arc<S>) -> Self {
        Self {
            hub,
            store: store.clone(),
            trades: store,
        }
    }
}

/// Random amount deviation in `[-5%, +5%]`, in basis points.
fn random_jitter() -> Decimal {
    let bps: i64 = rand::thread_rng().gen_range(-500..=500);
    Decimal::new(bps, 4)
}

#[async_trait]
impl Strategy for VolumeAlgorithm {
    type Row = VolumeStrategy;
    type Command = VolumeCommand;

    fn store(&self) -> &Arc<dyn StrategyStore<VolumeStrategy>> {
        &self.store
    }

    fn hub(&self) -> &Arc<ExchangeHub> {
        &self.hub
    }

    async fn prepare(&self, command: &VolumeCommand) -> Result<VolumeStrategy> {
        let pair = command.pair();
        self.hub.validate_market(&command.exchange_name, &pair).await?;
        if self
            .hub
            .account(&command.exchange_name, AccountLabel::Additional)
            .await
            .is_err()
        {
            return Err(EngineError::InvalidCommand(format!(
                "volume trading needs an additional account on {}",
                command.exchange_name
            )));
        }

        Ok(VolumeStrategy {
            id: 0,
            user_id: command.user_id.clone(),
            client_id: command.client_id.clone(),
            side_a: command.side_a.clone(),
            side_b: command.side_b.clone(),
            exchange_name: command.exchange_name.clone(),
            increment_percentage: command.increment_percentage,
            price_push_rate: command.price_push_rate,
            amount_to_trade: command.amount_to_trade,
            num_total_trades: command.num_total_trades,
            trades_executed: 0,
            current_maker_price: None,
            check_interval_seconds: command.check_interval_seconds,
            state: RuntimeState::new(StrategyStatus::Running),
        })
    }

    async fn evaluate(&self, row: &VolumeStrategy) -> Result<()> {
        if row.is_complete() {
            let cancelled = self.on_teardown(row).await?;
            if cancelled > 0 {
                info!("Volume {}: cancelled {} leftover orders", row.id, cancelled);
            }
            self.store.update_status(row.id, StrategyStatus::Deleted).await?;
            info!(
                "🏁 Volume {} [{}] finished {} trades, deleted",
                row.id, row.user_id, row.trades_executed
            );
            return Ok(());
        }

        let pair = row.pair();
        let exchange = row.exchange_name.as_str();
        let default_client = self.hub.account(exchange, AccountLabel::Default).await?;

        let book = default_client.fetch_order_book(&pair).await?;
        let (best_ask, mid) = match (book.best_ask(), book.mid()) {
            (Some(ask), Some(mid)) => (ask, mid),
            _ => {
                return Err(EngineError::EmptyOrderBook {
                    exchange: exchange.to_string(),
                    pair,
                })
            }
        };

        let (maker_account, taker_account) = if default_account_is_maker(row.trades_executed) {
            (AccountLabel::Default, AccountLabel::Additional)
        } else {
            (AccountLabel::Additional, AccountLabel::Default)
        };
        let maker_client = self.hub.account(exchange, maker_account).await?;
        let taker_client = self.hub.account(exchange, taker_account).await?;

        let amount = maker_client
            .amount_to_precision(&pair, jittered_amount(row.amount_to_trade, random_jitter()))
            .await?;
        if amount.is_zero() {
            return Err(EngineError::Exchange(format!(
                "trade amount {} rounds to zero on {}",
                row.amount_to_trade, exchange
            )));
        }

        let market = maker_client.market(&pair).await?;
        let target = next_maker_price(
            mid,
            row.current_maker_price,
            row.increment_percentage,
            row.price_push_rate,
        );
        let price = clamp_below_ask(
            maker_client.price_to_precision(&pair, target).await?,
            best_ask,
            market.price_tick(),
        );

        let owner = OrderOwner {
            user_id: &row.user_id,
            client_id: &row.client_id,
        };
        let maker = self
            .hub
            .place_order(
                exchange,
                maker_account,
                owner,
                OrderRequest::limit(&pair, OrderSide::Buy, amount, price).post_only(),
            )
            .await?;
        let taker = self
            .hub
            .place_order(
                exchange,
                taker_account,
                owner,
                OrderRequest::limit(&pair, OrderSide::Sell, amount, price),
            )
            .await?;

        let (maker, taker) = tokio::try_join!(
            maker_client.fetch_order(&maker.id, &pair),
            taker_client.fetch_order(&taker.id, &pair)
        )?;
        for order in [&maker, &taker] {
            if !order.status.is_open() {
                self.hub.forget(exchange, &order.id).await;
            }
        }
        if !maker.status.is_filled() || !taker.status.is_filled() {
            warn!(
                "⚠️ Volume {}: trade {} not fully filled (maker {:?}, taker {:?})",
                row.id,
                row.trades_executed + 1,
                maker.status,
                taker.status
            );
        }

        let trades_executed = row.trades_executed + 1;
        self.trades.update_after_trade(row.id, trades_executed, price).await?;
        info!(
            "📈 Volume {} [{}]: trade {}/{} of {} {} @ {} ({} maker)",
            row.id, row.user_id, trades_executed, row.num_total_trades, amount, pair, price, maker_account
        );
        Ok(())
    }

    async fn on_teardown(&self, row: &VolumeStrategy) -> Result<usize> {
        self.hub
            .cancel_unfilled_orders(&row.exchange_name, &row.pair(), &row.user_id)
            .await
    }
}
