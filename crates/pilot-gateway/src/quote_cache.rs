//! Time-to-live quote cache.
//!
//! Caches last-known tradability and price per symbol. A fresh entry is
//! served without any downstream call; an expired or absent entry triggers
//! a rate-limited refetch. Failures are never cached, so the next caller
//! retries immediately instead of being served a poisoned entry.
//!
//! The whole map sits behind one async mutex held across the refresh, so
//! two concurrent callers cannot double-fetch the same symbol. Acceptable
//! given low symbol cardinality and a short TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use pilot_broker::{BrokerClient, BrokerError, BrokerResult, RateLimiter};
use pilot_core::Quote;
use pilot_telemetry::metrics::{QUOTE_CACHE_HITS_TOTAL, QUOTE_CACHE_MISSES_TOTAL};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{GatewayError, GatewayResult};

/// Quote cache configuration.
#[derive(Debug, Clone)]
pub struct QuoteCacheConfig {
    /// Entry lifetime from fetch.
    pub ttl: Duration,
    /// Canonical exchange for market-hours checks. Absent from the
    /// brokerage response means the market is treated as closed.
    pub exchange: String,
}

impl Default for QuoteCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5),
            exchange: "NASDAQ".to_string(),
        }
    }
}

struct CacheEntry {
    quote: Quote,
    fetched_at: Instant,
}

/// TTL cache of quotes, refreshed through the shared rate limiter.
pub struct QuoteCache {
    config: QuoteCacheConfig,
    broker: Arc<dyn BrokerClient>,
    rate_limiter: Arc<RateLimiter>,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl QuoteCache {
    pub fn new(
        config: QuoteCacheConfig,
        broker: Arc<dyn BrokerClient>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            config,
            broker,
            rate_limiter,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Get a quote, serving a cached entry while it is within TTL.
    pub async fn get_quote(&self, symbol: &str) -> GatewayResult<Quote> {
        self.get_quote_until(symbol, None).await
    }

    /// Like [`get_quote`](Self::get_quote), giving up at `deadline` if the
    /// rate-limit wait would overrun it. A deadline hit returns `Timeout`
    /// without issuing the downstream fetch.
    pub async fn get_quote_until(
        &self,
        symbol: &str,
        deadline: Option<Instant>,
    ) -> GatewayResult<Quote> {
        let mut entries = self.entries.lock().await;

        if let Some(entry) = entries.get(symbol) {
            if entry.fetched_at.elapsed() <= self.config.ttl {
                QUOTE_CACHE_HITS_TOTAL.inc();
                debug!(symbol, "Quote cache hit");
                return Ok(entry.quote.clone());
            }
        }

        QUOTE_CACHE_MISSES_TOTAL.inc();
        debug!(symbol, "Quote cache miss, refreshing");

        match deadline {
            Some(d) => self
                .rate_limiter
                .acquire_until(d)
                .await
                .map_err(|_| GatewayError::Timeout)?,
            None => self.rate_limiter.acquire().await,
        }

        let symbols = [symbol.to_string()];
        let quotes = self.broker.get_quotes(&symbols).await.map_err(|source| {
            warn!(symbol, error = %source, "Quote fetch failed");
            GatewayError::QuoteUnavailable {
                symbol: symbol.to_string(),
                source,
            }
        })?;

        let quote = quotes
            .into_iter()
            .find(|q| q.symbol == symbol)
            .ok_or_else(|| GatewayError::QuoteUnavailable {
                symbol: symbol.to_string(),
                source: BrokerError::InvalidResponse(
                    "symbol absent from quote response".to_string(),
                ),
            })?;

        entries.insert(
            symbol.to_string(),
            CacheEntry {
                quote: quote.clone(),
                fetched_at: Instant::now(),
            },
        );

        Ok(quote)
    }

    /// Check whether the canonical exchange is in a trading session.
    ///
    /// Rate-limited and never cached; the session status must always be
    /// fresh. An exchange missing from the response counts as closed.
    pub async fn is_market_open(&self) -> BrokerResult<bool> {
        self.rate_limiter.acquire().await;
        let hours = self.broker.get_market_hours().await?;

        match hours.iter().find(|h| h.exchange == self.config.exchange) {
            Some(h) => {
                if !h.is_open {
                    info!(
                        exchange = %h.exchange,
                        next_open = ?h.next_open,
                        "Market closed"
                    );
                }
                Ok(h.is_open)
            }
            None => {
                warn!(
                    exchange = %self.config.exchange,
                    "Exchange absent from market-hours response, treating as closed"
                );
                Ok(false)
            }
        }
    }
}
