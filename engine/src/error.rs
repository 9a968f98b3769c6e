//! Engine error taxonomy

use thiserror::Error;

use crate::model::StrategyKind;

/// Errors surfaced by strategy operations.
///
/// Validation variants are returned to the caller of create/pause/stop/delete.
/// Everything else is raised during evaluation and ends up as a paused reason.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("exchange {0} is not supported")]
    UnsupportedExchange(String),

    #[error("pair {pair} is not supported on {exchange}")]
    UnsupportedPair { exchange: String, pair: String },

    #[error("{kind} strategy {id} not found")]
    NotFound { kind: StrategyKind, id: String },

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("exchange error: {0}")]
    Exchange(String),

    #[error("order book for {pair} on {exchange} is empty")]
    EmptyOrderBook { exchange: String, pair: String },

    #[error("store error: {0}")]
    Store(#[from] sea_orm::DbErr),

    #[error("tick lock error: {0}")]
    Lock(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    pub fn not_found(kind: StrategyKind, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// True for errors the caller caused, as opposed to runtime failures.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedExchange(_)
                | Self::UnsupportedPair { .. }
                | Self::NotFound { .. }
                | Self::InvalidCommand(_)
        )
    }
}

impl From<redis::RedisError> for EngineError {
    fn from(err: redis::RedisError) -> Self {
        Self::Lock(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, EngineError>;
