//! Gateway error taxonomy.
//!
//! Every way an order can fail to reach the brokerage is a typed variant;
//! nothing is silently swallowed. Validation failures (everything before
//! submission) carry no side effects and are never retried.

use pilot_broker::BrokerError;
use thiserror::Error;

use crate::safety::SafetyViolation;

/// Errors surfaced by the execution gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The account snapshot could not be fetched; nothing was attempted.
    #[error("account information unavailable: {0}")]
    AccountUnavailable(#[source] BrokerError),

    /// No fresh quote could be obtained for the symbol.
    #[error("quote unavailable for {symbol}: {source}")]
    QuoteUnavailable {
        symbol: String,
        #[source]
        source: BrokerError,
    },

    /// The instrument does not currently accept orders.
    #[error("{symbol} is not tradable")]
    NotTradable { symbol: String },

    /// Notional amount too small to reach one share unit at 4-dp precision.
    #[error("computed share quantity is zero for notional {notional} at price {price}")]
    SizeTooSmall {
        notional: rust_decimal::Decimal,
        price: rust_decimal::Decimal,
    },

    /// A limit order was requested without a limit price.
    #[error("limit order requires a limit price")]
    MissingLimitPrice,

    /// The safety manager refused the trade.
    #[error("trade rejected by safety checks: {0}")]
    SafetyRejected(SafetyViolation),

    /// Submission failed after the retry budget was spent.
    #[error("order submission failed after {attempts} attempts: {source}")]
    SubmissionFailed {
        attempts: u32,
        #[source]
        source: BrokerError,
    },

    /// Caller deadline expired at a suspension point; no order was submitted.
    #[error("deadline exceeded before submission")]
    Timeout,
}

impl GatewayError {
    /// Short reason label for metrics and log fields.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::AccountUnavailable(_) => "account_unavailable",
            Self::QuoteUnavailable { .. } => "quote_unavailable",
            Self::NotTradable { .. } => "not_tradable",
            Self::SizeTooSmall { .. } => "size_too_small",
            Self::MissingLimitPrice => "missing_limit_price",
            Self::SafetyRejected(_) => "safety",
            Self::SubmissionFailed { .. } => "submission_failed",
            Self::Timeout => "timeout",
        }
    }

    /// Whether the underlying cause should halt the host process.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::AccountUnavailable(e)
            | Self::QuoteUnavailable { source: e, .. }
            | Self::SubmissionFailed { source: e, .. } => e.is_fatal(),
            _ => false,
        }
    }
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
