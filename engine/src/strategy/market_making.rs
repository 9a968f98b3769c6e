use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::commands::MarketMakingCommand;
use crate::error::{EngineError, Result};
use crate::exchange::{AccountLabel, ExchangeHub, OrderOwner, OrderRequest, OrderSide};
use crate::model::{MarketMakingStrategy, PriceSourceType, RuntimeState, StrategyStatus};
use crate::pricing::{build_layered_order_plan, placement_eligibility, price_source, LayerPlanParams};
use crate::store::StrategyStore;
use crate::strategy::Strategy;

/// Re-quotes `number_of_layers` buy/sell layers around a reference price every tick.
pub struct MarketMakingAlgorithm {
    hub: Arc<ExchangeHub>,
    store: Arc<dyn StrategyStore<MarketMakingStrategy>>,
}

impl MarketMakingAlgorithm {
    pub fn new(hub: Arc<ExchangeHub>, store: Arc<dyn StrategyStore<MarketMakingStrategy>>) -> Self {
        Self { hub, store }
    }

    /// Cancel the previous tick's quotes in the background.
    async fn cancel_stale_orders(&self, row: &MarketMakingStrategy, pair: &str) {
        let stale = self.hub.tracked_orders(&row.exchange_name, pair, &row.user_id).await;
        if stale.is_empty() {
            return;
        }
        let hub = Arc::clone(&self.hub);
        let id = row.id;
        tokio::spawn(async move {
            match hub.cancel_orders(stale).await {
                Ok(count) => debug!("Market making {}: cancelled {} stale orders", id, count),
                Err(e) => warn!("⚠️ Market making {}: stale order cancellation failed: {}", id, e),
            }
        });
    }
}

#[async_trait]
impl Strategy for MarketMakingAlgorithm {
    type Row = MarketMakingStrategy;
    type Command = MarketMakingCommand;

    fn store(&self) -> &Arc<dyn StrategyStore<MarketMakingStrategy>> {
        &self.store
    }

    fn hub(&self) -> &Arc<ExchangeHub> {
        &self.hub
    }

    async fn prepare(&self, command: &MarketMakingCommand) -> Result<MarketMakingStrategy> {
        let pair = command.pair();
        self.hub.validate_market(&command.exchange_name, &pair).await?;
        if let Some(oracle) = command
            .oracle_exchange_name
            .as_deref()
            .filter(|oracle| *oracle != command.exchange_name)
        {
            self.hub.validate_market(oracle, &pair).await?;
        }

        let pricing_exchange = command
            .oracle_exchange_name
            .as_deref()
            .unwrap_or(&command.exchange_name);
        let start_price = match self.hub.client(pricing_exchange).await?.fetch_ticker(&pair).await {
            Ok(ticker) => Some(ticker.last),
            Err(e) => {
                warn!("No start price for {} on {}: {}", pair, pricing_exchange, e);
                None
            }
        };

        Ok(MarketMakingStrategy {
            id: 0,
            user_id: command.user_id.clone(),
            client_id: command.client_id.clone(),
            side_a: command.side_a.clone(),
            side_b: command.side_b.clone(),
            exchange_name: command.exchange_name.clone(),
            oracle_exchange_name: command.oracle_exchange_name.clone(),
            bid_spread: command.bid_spread,
            ask_spread: command.ask_spread,
            order_amount: command.order_amount,
            number_of_layers: command.number_of_layers,
            amount_change_type: command.amount_change_type,
            amount_change_per_layer: command.amount_change_per_layer,
            price_source_type: command.price_source_type,
            ceiling_price: command.ceiling_price,
            floor_price: command.floor_price,
            start_price,
            check_interval_seconds: command.check_interval_seconds,
            max_open_orders: command.max_open_orders,
            state: RuntimeState::new(StrategyStatus::Running),
        })
    }

    async fn evaluate(&self, row: &MarketMakingStrategy) -> Result<()> {
        let pair = row.pair();
        self.cancel_stale_orders(row, &pair).await;

        let pricing_exchange = row.pricing_exchange();
        let pricing = self.hub.client(pricing_exchange).await?;
        let book = pricing.fetch_order_book(&pair).await?;
        let ticker = match row.price_source_type {
            PriceSourceType::Last => Some(pricing.fetch_ticker(&pair).await?),
            _ => None,
        };
        let reference = price_source(&book, ticker.as_ref(), row.price_source_type).ok_or_else(|| {
            EngineError::EmptyOrderBook {
                exchange: pricing_exchange.to_string(),
                pair: pair.clone(),
            }
        })?;

        let eligibility = placement_eligibility(reference, row.ceiling_price, row.floor_price);
        if !eligibility.buy {
            info!(
                "⏸️ Market making {}: buys skipped, price {} above ceiling {:?}",
                row.id, reference, row.ceiling_price
            );
        }
        if !eligibility.sell {
            info!(
                "⏸️ Market making {}: sells skipped, price {} below floor {:?}",
                row.id, reference, row.floor_price
            );
        }

        let plan = build_layered_order_plan(&LayerPlanParams {
            price_source: reference,
            bid_spread: row.bid_spread,
            ask_spread: row.ask_spread,
            base_amount: row.order_amount,
            number_of_layers: row.number_of_layers,
            amount_change_type: row.amount_change_type,
            amount_change_per_layer: row.amount_change_per_layer,
            ceiling_price: row.ceiling_price,
            floor_price: row.floor_price,
        });

        let trading = self.hub.client(&row.exchange_name).await?;
        let owner = OrderOwner {
            user_id: &row.user_id,
            client_id: &row.client_id,
        };
        let cap = row.max_open_orders.map(|max| max as usize);
        let mut placed = 0usize;

        for layer in plan {
            let amount = trading.amount_to_precision(&pair, layer.amount).await?;
            if amount.is_zero() {
                warn!("Market making {}: layer {} amount rounds to zero", row.id, layer.layer);
                continue;
            }
            let quotes = [
                (OrderSide::Buy, layer.buy_price, layer.place_buy),
                (OrderSide::Sell, layer.sell_price, layer.place_sell),
            ];
            for (side, price, eligible) in quotes {
                if !eligible {
                    continue;
                }
                if cap.is_some_and(|cap| placed >= cap) {
                    debug!("Market making {}: reached {} orders this tick", row.id, placed);
                    return Ok(());
                }
                let price = trading.price_to_precision(&pair, price).await?;
                self.hub
                    .place_order(
                        &row.exchange_name,
                        AccountLabel::Default,
                        owner,
                        OrderRequest::limit(&pair, side, amount, price),
                    )
                    .await?;
                placed += 1;
            }
        }

        info!(
            "📊 Market making {} [{}]: placed {} orders on {} {} around {}",
            row.id, row.user_id, placed, row.exchange_name, pair, reference
        );
        Ok(())
    }

    async fn on_teardown(&self, row: &MarketMakingStrategy) -> Result<usize> {
        self.hub
            .cancel_unfilled_orders(&row.exchange_name, &row.pair(), &row.user_id)
            .await
    }
}
