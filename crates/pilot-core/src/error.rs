//! Error types for pilot-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid notional amount: {0}")]
    InvalidNotional(String),

    #[error("Invalid ticker: {0}")]
    InvalidTicker(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
