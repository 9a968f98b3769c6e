//! Shared pool of exchange clients and tracked strategy orders

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{EngineError, Result};
use crate::exchange::{ExchangeClient, Order, OrderRequest, OrderSide};

/// Which of a user's accounts on a venue an order goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountLabel {
    Default,
    Additional,
}

impl fmt::Display for AccountLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Default => "default",
            Self::Additional => "additional",
        })
    }
}

/// An order placed on behalf of a strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedOrder {
    pub order_id: String,
    pub exchange: String,
    pub account: AccountLabel,
    pub pair: String,
    pub side: OrderSide,
    pub user_id: String,
    pub client_id: String,
    pub placed_at: DateTime<Utc>,
}

/// Owner of an order, recorded alongside it.
#[derive(Debug, Clone, Copy)]
pub struct OrderOwner<'a> {
    pub user_id: &'a str,
    pub client_id: &'a str,
}

/// Strip a derivatives settlement suffix (`BTC/USDT:USDT` -> `BTC/USDT`) and uppercase.
pub fn normalize_pair(pair: &str) -> String {
    let pair = pair.trim().to_uppercase();
    match pair.split_once(':') {
        Some((spot, _settle)) => spot.to_string(),
        None => pair,
    }
}

/// Exchange connection pool: one client per `(exchange, account)`.
#[derive(Default)]
pub struct ExchangeHub {
    clients: RwLock<HashMap<(String, AccountLabel), Arc<dyn ExchangeClient>>>,
    tracked: RwLock<Vec<TrackedOrder>>,
}

impl ExchangeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, account: AccountLabel, client: Arc<dyn ExchangeClient>) {
        let name = client.name().to_lowercase();
        info!("Registered {} account on exchange {}", account, name);
        self.clients.write().await.insert((name, account), client);
    }

    /// Default-account client of `exchange`.
    pub async fn client(&self, exchange: &str) -> Result<Arc<dyn ExchangeClient>> {
        self.account(exchange, AccountLabel::Default).await
    }

    pub async fn account(
        &self,
        exchange: &str,
        account: AccountLabel,
    ) -> Result<Arc<dyn ExchangeClient>> {
        self.clients
            .read()
            .await
            .get(&(exchange.to_lowercase(), account))
            .cloned()
            .ok_or_else(|| match account {
                AccountLabel::Default => EngineError::UnsupportedExchange(exchange.to_string()),
                AccountLabel::Additional => EngineError::Exchange(format!(
                    "no additional account configured on {}",
                    exchange
                )),
            })
    }

    /// Exchanges with a default account.
    pub async fn supported_exchanges(&self) -> HashSet<String> {
        self.clients
            .read()
            .await
            .keys()
            .filter(|(_, account)| *account == AccountLabel::Default)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub async fn supported_pairs(&self, exchange: &str) -> Result<HashSet<String>> {
        self.client(exchange).await?.pairs().await
    }

    /// Check that `exchange` is served and lists `pair`, tolerating derivatives suffixes.
    pub async fn validate_market(&self, exchange: &str, pair: &str) -> Result<()> {
        if !self.supported_exchanges().await.contains(&exchange.to_lowercase()) {
            return Err(EngineError::UnsupportedExchange(exchange.to_string()));
        }
        let wanted = normalize_pair(pair);
        let listed = self.supported_pairs(exchange).await?;
        if listed.iter().any(|p| normalize_pair(p) == wanted) {
            Ok(())
        } else {
            Err(EngineError::UnsupportedPair {
                exchange: exchange.to_string(),
                pair: pair.to_string(),
            })
        }
    }

    /// Place an order and, while it rests on the book, remember it for later cancellation.
    pub async fn place_order(
        &self,
        exchange: &str,
        account: AccountLabel,
        owner: OrderOwner<'_>,
        request: OrderRequest,
    ) -> Result<Order> {
        let client = self.account(exchange, account).await?;
        let order = client.create_order(request).await?;
        if !order.status.is_open() {
            return Ok(order);
        }
        self.tracked.write().await.push(TrackedOrder {
            order_id: order.id.clone(),
            exchange: exchange.to_lowercase(),
            account,
            pair: order.pair.clone(),
            side: order.side,
            user_id: owner.user_id.to_string(),
            client_id: owner.client_id.to_string(),
            placed_at: order.created_at,
        });
        Ok(order)
    }

    /// Snapshot of tracked orders of `user_id` on `exchange`/`pair`.
    pub async fn tracked_orders(&self, exchange: &str, pair: &str, user_id: &str) -> Vec<TrackedOrder> {
        let exchange = exchange.to_lowercase();
        let pair = normalize_pair(pair);
        self.tracked
            .read()
            .await
            .iter()
            .filter(|o| o.exchange == exchange && normalize_pair(&o.pair) == pair && o.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Tracked orders of `user_id` on `exchange`/`pair` that are still open on the venue.
    ///
    /// Entries the venue reports as filled or cancelled are dropped from tracking.
    pub async fn open_orders(&self, exchange: &str, pair: &str, user_id: &str) -> Result<Vec<TrackedOrder>> {
        let mut open = Vec::new();
        let mut settled = Vec::new();
        for tracked in self.tracked_orders(exchange, pair, user_id).await {
            let client = self.account(&tracked.exchange, tracked.account).await?;
            let order = client.fetch_order(&tracked.order_id, &tracked.pair).await?;
            if order.status.is_open() {
                open.push(tracked);
            } else {
                settled.push((tracked.exchange, tracked.order_id));
            }
        }
        self.untrack(&settled).await;
        Ok(open)
    }

    /// Stop tracking an order that is known to be settled.
    pub async fn forget(&self, exchange: &str, order_id: &str) {
        self.untrack(&[(exchange.to_lowercase(), order_id.to_string())]).await;
    }

    async fn untrack(&self, settled: &[(String, String)]) {
        if settled.is_empty() {
            return;
        }
        self.tracked
            .write()
            .await
            .retain(|o| !settled.iter().any(|(ex, id)| *ex == o.exchange && *id == o.order_id));
    }

    /// Cancel the given orders where still open. Returns how many were cancelled.
    ///
    /// Every order is attempted; the first failure is returned after the pass.
    pub async fn cancel_orders(&self, orders: Vec<TrackedOrder>) -> Result<usize> {
        let mut cancelled = 0;
        let mut settled = Vec::new();
        let mut first_error = None;

        for tracked in orders {
            let outcome = async {
                let client = self.account(&tracked.exchange, tracked.account).await?;
                let order = client.fetch_order(&tracked.order_id, &tracked.pair).await?;
                if order.status.is_open() {
                    client.cancel_order(&tracked.order_id, &tracked.pair).await?;
                    Ok::<bool, EngineError>(true)
                } else {
                    Ok(false)
                }
            }
            .await;

            match outcome {
                Ok(was_open) => {
                    if was_open {
                        cancelled += 1;
                    }
                    settled.push((tracked.exchange, tracked.order_id));
                }
                Err(e) => {
                    warn!(
                        "Failed to cancel order {} on {} ({}): {}",
                        tracked.order_id, tracked.exchange, tracked.pair, e
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        self.untrack(&settled).await;

        match first_error {
            Some(e) => Err(e),
            None => Ok(cancelled),
        }
    }

    /// Cancel every unfilled order `user_id` has on `exchange`/`pair`.
    pub async fn cancel_unfilled_orders(&self, exchange: &str, pair: &str, user_id: &str) -> Result<usize> {
        let orders = self.tracked_orders(exchange, pair, user_id).await;
        let count = self.cancel_orders(orders).await?;
        if count > 0 {
            info!("Cancelled {} unfilled orders of user {} on {} ({})", count, user_id, exchange, pair);
        }
        Ok(count)
    }
}
