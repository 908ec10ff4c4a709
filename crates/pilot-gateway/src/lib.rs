//! Execution gateway for the pilot trading system.
//!
//! Coordinates the safety-gating policy engine, the TTL quote cache, the
//! shared rate limiter and the retrying submission pipeline that together
//! decide whether, how, and when an order reaches the brokerage:
//! - `SafetyManager`: session/risk gate over proposed trades
//! - `QuoteCache`: time-to-live cache of tradability and price per symbol
//! - `ExecutionGateway`: validate → price → size → submit pipeline

pub mod error;
pub mod gateway;
pub mod quote_cache;
pub mod safety;

pub use error::{GatewayError, GatewayResult};
pub use gateway::{ExecutionGateway, OrderStage};
pub use quote_cache::{QuoteCache, QuoteCacheConfig};
pub use safety::{SafetyConfig, SafetyManager, SafetyViolation};
