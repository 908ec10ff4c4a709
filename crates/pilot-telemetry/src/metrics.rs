//! Prometheus metrics for the pilot execution gateway.
//!
//! Provides observability for:
//! - Order pipeline outcomes (submitted / rejected-by-reason / failed)
//! - Safety gate blocks
//! - Retry attempts
//! - Rate limiter waits
//! - Quote cache hits and misses
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, Counter, CounterVec, Histogram,
};

/// Orders confirmed by the brokerage (an order id came back).
pub static ORDERS_SUBMITTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "pilot_orders_submitted_total",
        "Total orders accepted by the brokerage",
        &["ticker", "side"]
    )
    .unwrap()
});

/// Orders rejected before submission.
/// Labels: reason (safety/not_tradable/size_too_small/missing_limit_price/
/// account_unavailable/quote_unavailable).
pub static ORDERS_REJECTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "pilot_orders_rejected_total",
        "Total orders rejected before submission",
        &["reason"]
    )
    .unwrap()
});

/// Orders that failed at submission after exhausting retries.
pub static ORDERS_FAILED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "pilot_orders_failed_total",
        "Total orders that failed at submission"
    )
    .unwrap()
});

/// Safety gate blocks by specific limit.
/// Labels: limit (session_cap/cooldown/position_size/daily_loss).
pub static SAFETY_BLOCKED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "pilot_safety_blocked_total",
        "Total trades blocked by the safety manager",
        &["limit"]
    )
    .unwrap()
});

/// Retried attempts (first attempts are not counted).
pub static RETRY_ATTEMPTS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "pilot_retry_attempts_total",
        "Total retried operation attempts"
    )
    .unwrap()
});

/// Time spent waiting on the brokerage rate limiter.
pub static RATE_LIMIT_WAIT_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "pilot_rate_limit_wait_seconds",
        "Seconds spent waiting for a rate-limit slot",
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0]
    )
    .unwrap()
});

/// Quote cache hits (fresh entry served, no downstream call).
pub static QUOTE_CACHE_HITS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "pilot_quote_cache_hits_total",
        "Quote cache hits (no downstream fetch)"
    )
    .unwrap()
});

/// Quote cache misses (expired or absent; downstream fetch issued).
pub static QUOTE_CACHE_MISSES_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "pilot_quote_cache_misses_total",
        "Quote cache misses (downstream fetch issued)"
    )
    .unwrap()
});
