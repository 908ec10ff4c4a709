//! Automated brokerage order-execution gateway.
//!
//! Main application that wires together:
//! - REST brokerage client behind a shared rate limiter
//! - Quote cache and market-hours checks
//! - Safety gating (loss floor, sizing, cooldown, session cap)
//! - Retried order submission with idempotent client order ids

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
