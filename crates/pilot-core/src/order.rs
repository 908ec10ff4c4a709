//! Order-related types and identifiers.
//!
//! Provides order side, type, time-in-force, request/result structs and
//! the client order ID used as an idempotency key across retries.

use crate::error::CoreError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Market order (primary type for the automated loop).
    Market,
    /// Limit order. Requires a limit price on the request.
    Limit,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Market => write!(f, "market"),
            Self::Limit => write!(f, "limit"),
        }
    }
}

/// Time-in-force for orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good-til-cancelled (the brokerage default used by the bot).
    #[default]
    #[serde(rename = "gtc")]
    GoodTilCancelled,
    /// Valid for the current trading day.
    #[serde(rename = "gfd")]
    Day,
    /// Immediate-or-cancel.
    #[serde(rename = "ioc")]
    ImmediateOrCancel,
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GoodTilCancelled => write!(f, "gtc"),
            Self::Day => write!(f, "gfd"),
            Self::ImmediateOrCancel => write!(f, "ioc"),
        }
    }
}

/// Client order ID for idempotency.
///
/// CRITICAL: Every order intent carries a unique cloid, generated once per
/// `place_order` call and reused across submission retries, so a retried
/// request never becomes a second order at the brokerage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientOrderId(String);

impl ClientOrderId {
    /// Create a new unique client order ID.
    ///
    /// Format: `pilot_{timestamp_ms}_{uuid_short}`
    pub fn new() -> Self {
        let ts = chrono::Utc::now().timestamp_millis();
        let uuid_short = &Uuid::new_v4().to_string()[..8];
        Self(format!("pilot_{ts}_{uuid_short}"))
    }

    /// Create from an existing string (for parsing responses).
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientOrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ClientOrderId {
    fn from(s: String) -> Self {
        Self::from_string(s)
    }
}

/// An order intent as supplied by a caller (signal loop or manual action).
///
/// Carries the notional dollar amount; share quantity is computed by the
/// gateway from a fresh quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Ticker symbol (e.g., "AAPL").
    pub ticker: String,
    /// Buy or sell.
    pub side: OrderSide,
    /// Dollar amount to trade, independent of share count. Must be > 0.
    pub notional: Decimal,
    /// Market or limit.
    pub order_type: OrderType,
    /// Limit price, required when `order_type` is `Limit`.
    pub limit_price: Option<Decimal>,
    /// Time-in-force. Defaults to GTC.
    #[serde(default)]
    pub time_in_force: TimeInForce,
}

impl OrderRequest {
    /// Create a market order request with default TIF.
    pub fn market(ticker: impl Into<String>, side: OrderSide, notional: Decimal) -> Self {
        Self {
            ticker: ticker.into(),
            side,
            notional,
            order_type: OrderType::Market,
            limit_price: None,
            time_in_force: TimeInForce::default(),
        }
    }

    /// Create a limit order request with default TIF.
    pub fn limit(
        ticker: impl Into<String>,
        side: OrderSide,
        notional: Decimal,
        limit_price: Decimal,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            side,
            notional,
            order_type: OrderType::Limit,
            limit_price: Some(limit_price),
            time_in_force: TimeInForce::default(),
        }
    }

    /// Check the request is well formed before it reaches the gateway.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.ticker.trim().is_empty() {
            return Err(CoreError::InvalidTicker(
                "ticker must not be empty".to_string(),
            ));
        }
        if self.notional <= Decimal::ZERO {
            return Err(CoreError::InvalidNotional(format!(
                "notional must be positive, got {}",
                self.notional
            )));
        }
        Ok(())
    }
}

/// Submission status as reported back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Accepted by the brokerage (an order id was returned).
    Submitted,
    /// Rejected before submission (safety gate, tradability, sizing).
    Rejected,
    /// Submission attempted and failed after retries.
    Failed,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submitted => write!(f, "submitted"),
            Self::Rejected => write!(f, "rejected"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResult {
    /// Brokerage-assigned order identifier.
    pub order_id: String,
    /// Submission status.
    pub status: OrderStatus,
    /// Share quantity requested (4-dp fractional shares).
    pub shares_requested: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_order_side_opposite() {
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
        assert_eq!(OrderSide::Sell.opposite(), OrderSide::Buy);
    }

    #[test]
    fn test_client_order_id_unique() {
        let id1 = ClientOrderId::new();
        let id2 = ClientOrderId::new();
        assert_ne!(id1, id2);
        assert!(id1.as_str().starts_with("pilot_"));
    }

    #[test]
    fn test_market_request_has_no_limit_price() {
        let req = OrderRequest::market("AAPL", OrderSide::Buy, dec!(1000));
        assert_eq!(req.order_type, OrderType::Market);
        assert!(req.limit_price.is_none());
        assert_eq!(req.time_in_force, TimeInForce::GoodTilCancelled);
    }

    #[test]
    fn test_validate_rejects_bad_requests() {
        let req = OrderRequest::market("", OrderSide::Buy, dec!(1000));
        assert!(matches!(req.validate(), Err(CoreError::InvalidTicker(_))));

        let req = OrderRequest::market("AAPL", OrderSide::Buy, dec!(0));
        assert!(matches!(req.validate(), Err(CoreError::InvalidNotional(_))));

        let req = OrderRequest::market("AAPL", OrderSide::Buy, dec!(-50));
        assert!(matches!(req.validate(), Err(CoreError::InvalidNotional(_))));

        let req = OrderRequest::market("AAPL", OrderSide::Buy, dec!(1000));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_tif_serde_rename() {
        let json = serde_json::to_string(&TimeInForce::GoodTilCancelled).unwrap();
        assert_eq!(json, "\"gtc\"");
    }
}
