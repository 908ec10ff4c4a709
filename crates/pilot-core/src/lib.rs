//! Core domain types for the pilot execution gateway.
//!
//! This crate provides the fundamental types shared by the trading system:
//! - `OrderRequest`, `OrderResult`: order intent and submission outcome
//! - `Quote`, `AccountInfo`, `Position`: brokerage snapshots
//! - `OrderSide`, `OrderType`, `TimeInForce`: trading enums
//! - `ClientOrderId`: per-intent idempotency key
//! - `TradeSignal`: input from the signal-source collaborator

pub mod account;
pub mod error;
pub mod order;
pub mod quote;
pub mod signal;
pub mod sizing;

pub use account::{AccountInfo, Holding, Position};
pub use error::{CoreError, Result};
pub use order::{
    ClientOrderId, OrderRequest, OrderResult, OrderSide, OrderStatus, OrderType, TimeInForce,
};
pub use quote::{MarketHours, Quote};
pub use signal::TradeSignal;
pub use sizing::{round_shares, SHARE_PRECISION};
