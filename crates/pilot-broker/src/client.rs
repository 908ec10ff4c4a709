//! Broker client trait for order submission and account queries.
//!
//! Provides a trait-based abstraction over the brokerage REST API.
//! This allows for:
//! - Dependency injection for testing
//! - Separation of gating/pricing logic from transport

use std::pin::Pin;

use pilot_core::{
    AccountInfo, ClientOrderId, MarketHours, OrderSide, OrderType, Position, Quote, TimeInForce,
};
use rust_decimal::Decimal;

use crate::error::BrokerResult;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// A fully sized order ready for submission.
///
/// Built by the gateway after pricing and sizing; the broker client maps it
/// onto the one matching brokerage call (market/limit x buy/sell).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOrder {
    /// Idempotency key, stable across retries of the same intent.
    pub cloid: ClientOrderId,
    /// Ticker symbol.
    pub ticker: String,
    /// Buy or sell.
    pub side: OrderSide,
    /// Share quantity (4-dp fractional).
    pub quantity: Decimal,
    /// Market or limit.
    pub order_type: OrderType,
    /// Limit price; present iff `order_type` is `Limit`.
    pub limit_price: Option<Decimal>,
    /// Time-in-force.
    pub time_in_force: TimeInForce,
}

/// Acknowledgement returned by the brokerage for a submitted order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderAck {
    /// Brokerage-assigned order identifier.
    pub order_id: String,
    /// Raw order state string as reported (e.g., "queued", "confirmed").
    pub state: String,
}

/// Trait for brokerage backends.
///
/// All calls are fallible with [`crate::BrokerError`] and may block on the
/// network. Rate limiting is the caller's responsibility; implementations
/// perform exactly one upstream call per method invocation.
pub trait BrokerClient: Send + Sync {
    /// Fetch the current account snapshot.
    fn get_account_info(&self) -> BoxFuture<'_, BrokerResult<AccountInfo>>;

    /// Fetch quotes for a batch of symbols.
    fn get_quotes<'a>(&'a self, symbols: &'a [String]) -> BoxFuture<'a, BrokerResult<Vec<Quote>>>;

    /// Fetch trading-session status for all exchanges.
    ///
    /// Callers filter for their canonical exchange; an exchange absent from
    /// the result is treated as closed.
    fn get_market_hours(&self) -> BoxFuture<'_, BrokerResult<Vec<MarketHours>>>;

    /// Submit an order. Exactly one submission attempt per call.
    fn submit_order(&self, order: SubmitOrder) -> BoxFuture<'_, BrokerResult<OrderAck>>;

    /// Fetch all open positions.
    fn get_positions(&self) -> BoxFuture<'_, BrokerResult<Vec<Position>>>;

    /// End the brokerage session.
    fn logout(&self) -> BoxFuture<'_, BrokerResult<()>>;
}
