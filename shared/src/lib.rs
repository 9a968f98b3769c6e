pub mod database;
pub mod redis;
pub mod config;
pub mod entity;

pub use database::get_db_connection;
pub use redis::{get_redis_client, Redis};
pub use config::Config;
