//! Main application orchestration.
//!
//! Wires the brokerage client, rate limiter, quote cache, safety manager
//! and execution gateway together, then drives the automated signal loop:
//! wait for the market to open, forward each incoming signal to the
//! gateway, and keep going on per-order failures.

use crate::config::AppConfig;
use crate::error::AppResult;
use chrono::{NaiveDate, Utc};
use pilot_broker::{BrokerClient, RateLimiter, RestBrokerClient};
use pilot_core::{OrderRequest, TradeSignal};
use pilot_gateway::{ExecutionGateway, QuoteCache, SafetyManager};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// How long to wait before retrying a failed market-hours check.
const HOURS_CHECK_RETRY: Duration = Duration::from_secs(30);

/// Main application.
pub struct Application {
    config: AppConfig,
    broker: Arc<dyn BrokerClient>,
    gateway: ExecutionGateway,
    safety: Arc<SafetyManager>,
    current_day: NaiveDate,
}

impl Application {
    /// Wire up all components from configuration.
    ///
    /// Fails when the auth token env var is unset or the HTTP client
    /// cannot be built.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let token = config.auth_token()?;
        let broker: Arc<dyn BrokerClient> =
            Arc::new(RestBrokerClient::new(&config.broker.base_url, token)?);

        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit.max_calls,
            config.rate_limit_period(),
        ));
        let safety = Arc::new(SafetyManager::new(config.safety_config()));
        let quotes = QuoteCache::new(
            config.quote_cache_config(),
            broker.clone(),
            rate_limiter.clone(),
        );
        let gateway = ExecutionGateway::new(
            broker.clone(),
            rate_limiter,
            quotes,
            config.retry_policy(),
            safety.clone(),
        );

        Ok(Self {
            config,
            broker,
            gateway,
            safety,
            current_day: Utc::now().date_naive(),
        })
    }

    /// Run the signal loop until the channel closes, Ctrl-C arrives, or a
    /// fatal brokerage error surfaces.
    pub async fn run(mut self, mut signals: mpsc::Receiver<TradeSignal>) -> AppResult<()> {
        info!(
            base_url = %self.config.broker.base_url,
            exchange = %self.config.quotes.exchange,
            "Signal loop started"
        );

        let result = loop {
            self.roll_daily_limits();

            if !self.wait_for_open_market().await {
                break Ok(());
            }

            let signal = tokio::select! {
                maybe = signals.recv() => match maybe {
                    Some(signal) => signal,
                    None => {
                        info!("Signal channel closed, shutting down");
                        break Ok(());
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl-C received, shutting down");
                    break Ok(());
                }
            };

            if let Err(e) = self.handle_signal(signal).await {
                break Err(e);
            }
        };

        self.logout().await;
        result
    }

    /// Place one order for a signal. Per-order failures are logged and
    /// swallowed; only a fatal error (revoked session) propagates.
    async fn handle_signal(&self, signal: TradeSignal) -> AppResult<()> {
        info!(
            ticker = %signal.ticker,
            command = %signal.command,
            amount = %signal.amount,
            "Processing trade signal"
        );

        let request = OrderRequest::market(signal.ticker, signal.command, signal.amount);
        if let Err(e) = request.validate() {
            warn!(error = %e, "Dropping malformed signal");
            return Ok(());
        }

        match self.gateway.place_order(request).await {
            Ok(result) => {
                info!(
                    order_id = %result.order_id,
                    shares = %result.shares_requested,
                    trades_this_session = self.safety.trade_count(),
                    "Order submitted"
                );
                Ok(())
            }
            Err(e) if e.is_fatal() => {
                error!(error = %e, "Fatal brokerage error, stopping the loop");
                Err(e.into())
            }
            Err(e) => {
                warn!(error = %e, "Order not placed");
                Ok(())
            }
        }
    }

    /// Block until the market is open, sleeping between checks. Returns
    /// false when Ctrl-C arrives while waiting.
    async fn wait_for_open_market(&mut self) -> bool {
        loop {
            match self.gateway.is_market_open().await {
                Ok(true) => return true,
                Ok(false) => {
                    info!(
                        sleep_secs = self.config.signal_loop.closed_market_sleep_secs,
                        "Market closed, sleeping"
                    );
                    let pause = self.config.closed_market_sleep();
                    tokio::select! {
                        _ = sleep(pause) => {}
                        _ = tokio::signal::ctrl_c() => {
                            info!("Ctrl-C received while waiting for market open");
                            return false;
                        }
                    }
                    self.roll_daily_limits();
                }
                Err(e) => {
                    warn!(error = %e, "Market hours check failed, retrying");
                    sleep(HOURS_CHECK_RETRY).await;
                }
            }
        }
    }

    /// Reset the daily loss accumulator when the UTC date rolls over.
    fn roll_daily_limits(&mut self) {
        let today = Utc::now().date_naive();
        if today != self.current_day {
            info!(%today, "UTC day rollover, resetting daily limits");
            self.safety.reset_daily();
            self.current_day = today;
        }
    }

    /// Best-effort session logout on shutdown.
    async fn logout(&self) {
        match self.broker.logout().await {
            Ok(()) => info!("Logged out of brokerage session"),
            Err(e) => warn!(error = %e, "Logout failed"),
        }
    }
}
