use std::str::FromStr;

use dotenv::dotenv;
use rust_decimal::Decimal;

pub struct Config {
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub run_migrations: bool,
    pub tick_interval_secs: u64,
    pub tick_lock_key: String,
    pub tick_lock_ttl_ms: u64,
    pub paper_exchanges: Vec<String>,
    pub paper_pairs: Vec<String>,
    pub paper_start_price: Decimal,
    pub paper_feed_interval_ms: u64,
    pub seed_file: Option<String>,
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenv().ok();

        Ok(Config {
            database_url: non_empty_var("DATABASE_URL"),
            redis_url: non_empty_var("REDIS_URL"),
            run_migrations: std::env::var("RUN_MIGRATIONS")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            tick_interval_secs: std::env::var("TICK_INTERVAL_SECS")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid TICK_INTERVAL_SECS: {}", e))?,
            tick_lock_key: std::env::var("TICK_LOCK_KEY")
                .unwrap_or_else(|_| "strategy-engine:tick".to_string()),
            tick_lock_ttl_ms: std::env::var("TICK_LOCK_TTL_MS")
                .unwrap_or_else(|_| "30000".to_string())
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid TICK_LOCK_TTL_MS: {}", e))?,
            paper_exchanges: list_var("PAPER_EXCHANGES", "binance,okx"),
            paper_pairs: list_var("PAPER_PAIRS", "BTC/USDT,ETH/USDT"),
            paper_start_price: Decimal::from_str(
                &std::env::var("PAPER_START_PRICE").unwrap_or_else(|_| "100".to_string()),
            )
            .map_err(|e| anyhow::anyhow!("Invalid PAPER_START_PRICE: {}", e))?,
            paper_feed_interval_ms: std::env::var("PAPER_FEED_INTERVAL_MS")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid PAPER_FEED_INTERVAL_MS: {}", e))?,
            seed_file: non_empty_var("SEED_FILE"),
            log_json: std::env::var("LOG_JSON")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn list_var(name: &str, default: &str) -> Vec<String> {
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
