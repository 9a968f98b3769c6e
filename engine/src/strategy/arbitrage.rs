use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::commands::ArbitrageCommand;
use crate::error::Result;
use crate::exchange::{AccountLabel, ExchangeHub, OrderOwner, OrderRequest, OrderSide};
use crate::model::{ArbitrageStrategy, RuntimeState, StrategyStatus};
use crate::pricing::{arbitrage_opportunity, profit_loss, vwap_for_amount, ArbitrageDirection};
use crate::store::StrategyStore;
use crate::strategy::Strategy;

/// Buys on the cheaper venue and sells on the dearer one when the VWAP spread
/// for the configured amount reaches `min_profitability`.
pub struct ArbitrageAlgorithm {
    hub: Arc<ExchangeHub>,
    store: Arc<dyn StrategyStore<ArbitrageStrategy>>,
}

/// Both legs of one arbitrage trade.
struct Legs<'a> {
    buy_exchange: &'a str,
    buy_price: Decimal,
    sell_exchange: &'a str,
    sell_price: Decimal,
}

impl ArbitrageAlgorithm {
    pub fn new(hub: Arc<ExchangeHub>, store: Arc<dyn StrategyStore<ArbitrageStrategy>>) -> Self {
        Self { hub, store }
    }

    /// Orders of this strategy's user still resting on either venue.
    async fn open_orders(&self, row: &ArbitrageStrategy, pair: &str) -> Result<usize> {
        let (a, b) = tokio::try_join!(
            self.hub.open_orders(&row.exchange_a_name, pair, &row.user_id),
            self.hub.open_orders(&row.exchange_b_name, pair, &row.user_id),
        )?;
        Ok(a.len() + b.len())
    }

    async fn execute(&self, row: &ArbitrageStrategy, pair: &str, legs: Legs<'_>) -> Result<()> {
        let buy_client = self.hub.client(legs.buy_exchange).await?;
        let sell_client = self.hub.client(legs.sell_exchange).await?;

        let amount = buy_client.amount_to_precision(pair, row.amount_to_trade).await?;
        let amount = sell_client.amount_to_precision(pair, amount).await?;
        let buy_price = buy_client.price_to_precision(pair, legs.buy_price).await?;
        let sell_price = sell_client.price_to_precision(pair, legs.sell_price).await?;

        let owner = OrderOwner {
            user_id: &row.user_id,
            client_id: &row.client_id,
        };

        let buy = self
            .hub
            .place_order(
                legs.buy_exchange,
                AccountLabel::Default,
                owner,
                OrderRequest::limit(pair, OrderSide::Buy, amount, buy_price),
            )
            .await?;
        let sell = self
            .hub
            .place_order(
                legs.sell_exchange,
                AccountLabel::Default,
                owner,
                OrderRequest::limit(pair, OrderSide::Sell, amount, sell_price),
            )
            .await?;

        let pnl = profit_loss(buy_price, sell_price, amount, buy.fee_cost(), sell.fee_cost());
        info!(
            "💰 Arbitrage {} [{}]: bought {} {} on {} @ {}, sold on {} @ {}, P&L {}",
            row.id,
            row.user_id,
            amount,
            pair,
            legs.buy_exchange,
            buy_price,
            legs.sell_exchange,
            sell_price,
            pnl
        );
        Ok(())
    }
}

#[async_trait]
impl Strategy for ArbitrageAlgorithm {
    type Row = ArbitrageStrategy;
    type Command = ArbitrageCommand;

    fn store(&self) -> &Arc<dyn StrategyStore<ArbitrageStrategy>> {
        &self.store
    }

    fn hub(&self) -> &Arc<ExchangeHub> {
        &self.hub
    }

    async fn prepare(&self, command: &ArbitrageCommand) -> Result<ArbitrageStrategy> {
        let pair = command.pair();
        self.hub.validate_market(&command.exchange_a_name, &pair).await?;
        self.hub.validate_market(&command.exchange_b_name, &pair).await?;

        Ok(ArbitrageStrategy {
            id: 0,
            user_id: command.user_id.clone(),
            client_id: command.client_id.clone(),
            side_a: command.side_a.clone(),
            side_b: command.side_b.clone(),
            exchange_a_name: command.exchange_a_name.clone(),
            exchange_b_name: command.exchange_b_name.clone(),
            amount_to_trade: command.amount_to_trade,
            min_profitability: command.min_profitability,
            check_interval_seconds: command.check_interval_seconds,
            max_open_orders: command.max_open_orders,
            state: RuntimeState::new(StrategyStatus::Running),
        })
    }

    async fn evaluate(&self, row: &ArbitrageStrategy) -> Result<()> {
        let pair = row.pair();

        if let Some(max) = row.max_open_orders {
            let open = self.open_orders(row, &pair).await?;
            if open + 2 > max as usize {
                debug!(
                    "Arbitrage {} has {} open orders (max {}), skipping",
                    row.id, open, max
                );
                return Ok(());
            }
        }

        let client_a = self.hub.client(&row.exchange_a_name).await?;
        let client_b = self.hub.client(&row.exchange_b_name).await?;
        let (book_a, book_b) = tokio::try_join!(
            client_a.fetch_order_book(&pair),
            client_b.fetch_order_book(&pair)
        )?;

        let amount = row.amount_to_trade;

        let buy_a = vwap_for_amount(&book_a, amount, OrderSide::Buy);
        let sell_b = vwap_for_amount(&book_b, amount, OrderSide::Sell);
        if arbitrage_opportunity(buy_a, sell_b, row.min_profitability, ArbitrageDirection::BuySelfSellOther) {
            let legs = Legs {
                buy_exchange: &row.exchange_a_name,
                buy_price: buy_a,
                sell_exchange: &row.exchange_b_name,
                sell_price: sell_b,
            };
            return self.execute(row, &pair, legs).await;
        }

        let sell_a = vwap_for_amount(&book_a, amount, OrderSide::Sell);
        let buy_b = vwap_for_amount(&book_b, amount, OrderSide::Buy);
        if arbitrage_opportunity(sell_a, buy_b, row.min_profitability, ArbitrageDirection::SellSelfBuyOther) {
            let legs = Legs {
                buy_exchange: &row.exchange_b_name,
                buy_price: buy_b,
                sell_exchange: &row.exchange_a_name,
                sell_price: sell_a,
            };
            return self.execute(row, &pair, legs).await;
        }

        debug!(
            "No arbitrage for {} between {} and {} (buy A {}, sell B {}, sell A {}, buy B {})",
            pair, row.exchange_a_name, row.exchange_b_name, buy_a, sell_b, sell_a, buy_b
        );
        Ok(())
    }

    async fn on_teardown(&self, row: &ArbitrageStrategy) -> Result<usize> {
        let pair = row.pair();
        let on_a = self
            .hub
            .cancel_unfilled_orders(&row.exchange_a_name, &pair, &row.user_id)
            .await;
        let on_b = self
            .hub
            .cancel_unfilled_orders(&row.exchange_b_name, &pair, &row.user_id)
            .await;
        match (on_a, on_b) {
            (Ok(a), Ok(b)) => Ok(a + b),
            (Err(e), _) | (_, Err(e)) => {
                warn!("Teardown of arbitrage {} incomplete: {}", row.id, e);
                Err(e)
            }
        }
    }
}
