//! Brokerage client boundary for the pilot execution gateway.
//!
//! Provides:
//! - `BrokerClient`: the trait every brokerage backend implements
//! - `RestBrokerClient`: reqwest-based implementation against the REST API
//! - `RateLimiter`: sliding-window quota shared by all outbound calls
//! - `RetryPolicy`: bounded retries with exponential backoff

pub mod client;
pub mod error;
pub mod rate_limiter;
pub mod rest;
pub mod retry;

pub use client::{BoxFuture, BrokerClient, OrderAck, SubmitOrder};
pub use error::{BrokerError, BrokerResult};
pub use rate_limiter::{DeadlineExceeded, RateLimiter};
pub use rest::RestBrokerClient;
pub use retry::{RetryError, RetryPolicy};
