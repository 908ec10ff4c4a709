//! Order execution pipeline.
//!
//! Each `place_order` call runs the sequential pipeline
//! `Requested → SafetyChecked → Priced → Sized → Submitted →
//! {Confirmed | Rejected | Failed}`:
//!
//! 1. Account snapshot (rate-limited)      → AccountUnavailable
//! 2. Safety gate                          → SafetyRejected
//! 3. Quote via TTL cache (rate-limited)   → QuoteUnavailable / NotTradable
//! 4. Share sizing at 4-dp precision       → SizeTooSmall
//! 5. Submission with classified retries   → SubmissionFailed
//!
//! Steps 1-4 are local validation with no side effects and are never
//! retried. Only the brokerage submission is wrapped in the retry policy,
//! and only transient failures loop. A submission mutex serializes
//! concurrent callers so the check-then-act window between the safety gate
//! and `record_trade` cannot be raced; callers queue rather than run in
//! parallel.
//!
//! Deadlines are honored at suspension points only (submit-lock wait,
//! rate-limit waits, retry backoff). Once a brokerage call is in flight it
//! is always awaited; a request is never cancelled mid-flight.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use pilot_broker::{
    BrokerClient, BrokerError, RateLimiter, RetryError, RetryPolicy, SubmitOrder,
};
use pilot_core::{
    round_shares, AccountInfo, ClientOrderId, Holding, OrderRequest, OrderResult, OrderStatus,
    OrderType, Quote,
};
use pilot_telemetry::metrics::{
    ORDERS_FAILED_TOTAL, ORDERS_REJECTED_TOTAL, ORDERS_SUBMITTED_TOTAL,
};
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::error::{GatewayError, GatewayResult};
use crate::quote_cache::QuoteCache;
use crate::safety::SafetyManager;

/// Pipeline stage of an order request, for logging and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStage {
    Requested,
    SafetyChecked,
    Priced,
    Sized,
    Submitted,
    Confirmed,
    Rejected,
    Failed,
}

impl fmt::Display for OrderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Requested => "requested",
            Self::SafetyChecked => "safety_checked",
            Self::Priced => "priced",
            Self::Sized => "sized",
            Self::Submitted => "submitted",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Submission-step failure, separating deadline hits at the rate limiter
/// from brokerage errors so the retry classification stays accurate.
#[derive(Debug, Error)]
enum SubmitError {
    #[error("deadline exceeded while waiting for a rate-limit slot")]
    Deadline,
    #[error(transparent)]
    Broker(BrokerError),
}

/// Orchestrates safety gating, pricing, sizing and retrying submission.
///
/// Owns the quote cache and retry policy, shares the rate limiter with
/// every other brokerage caller, and holds the safety manager by reference.
pub struct ExecutionGateway {
    broker: Arc<dyn BrokerClient>,
    rate_limiter: Arc<RateLimiter>,
    quotes: QuoteCache,
    retry: RetryPolicy,
    safety: Arc<SafetyManager>,
    /// Serializes trade attempts per account. Concurrent `place_order`
    /// calls queue here instead of racing the safety counters.
    submit_lock: Mutex<()>,
}

impl ExecutionGateway {
    pub fn new(
        broker: Arc<dyn BrokerClient>,
        rate_limiter: Arc<RateLimiter>,
        quotes: QuoteCache,
        retry: RetryPolicy,
        safety: Arc<SafetyManager>,
    ) -> Self {
        Self {
            broker,
            rate_limiter,
            quotes,
            retry,
            safety,
            submit_lock: Mutex::new(()),
        }
    }

    /// Validate, price, size and submit an order. No deadline.
    pub async fn place_order(&self, req: OrderRequest) -> GatewayResult<OrderResult> {
        self.place_order_until(req, None).await
    }

    /// Like [`place_order`](Self::place_order) with a caller deadline.
    ///
    /// A deadline hit while queued, waiting on a rate-limit slot or during
    /// retry backoff returns [`GatewayError::Timeout`] with no submission
    /// and no state mutation.
    pub async fn place_order_with_deadline(
        &self,
        req: OrderRequest,
        timeout: Duration,
    ) -> GatewayResult<OrderResult> {
        self.place_order_until(req, Some(Instant::now() + timeout))
            .await
    }

    async fn place_order_until(
        &self,
        req: OrderRequest,
        deadline: Option<Instant>,
    ) -> GatewayResult<OrderResult> {
        debug!(
            ticker = %req.ticker,
            side = %req.side,
            notional = %req.notional,
            order_type = %req.order_type,
            stage = %OrderStage::Requested,
            "Order requested"
        );

        // Local validation: a limit order without a price is doomed, so it
        // is rejected before any brokerage traffic (and never retried).
        if req.order_type == OrderType::Limit && req.limit_price.is_none() {
            return Err(self.reject(&req, GatewayError::MissingLimitPrice));
        }

        let _guard = match deadline {
            Some(d) => timeout_at(d, self.submit_lock.lock())
                .await
                .map_err(|_| GatewayError::Timeout)?,
            None => self.submit_lock.lock().await,
        };

        // An unreachable account rejects the order; reads through
        // `get_account_info` report the same failure without the metric.
        let account = self.fetch_account(deadline).await.map_err(|e| match e {
            GatewayError::Timeout => GatewayError::Timeout,
            e => self.reject(&req, e),
        })?;

        self.safety
            .check(&account, req.notional)
            .map_err(|v| self.reject(&req, GatewayError::SafetyRejected(v)))?;
        debug!(ticker = %req.ticker, stage = %OrderStage::SafetyChecked, "Safety checks passed");

        let quote = self.quotes.get_quote_until(&req.ticker, deadline).await?;
        if !quote.tradable {
            return Err(self.reject(
                &req,
                GatewayError::NotTradable {
                    symbol: req.ticker.clone(),
                },
            ));
        }
        debug!(
            ticker = %req.ticker,
            last_price = %quote.last_price,
            stage = %OrderStage::Priced,
            "Quote obtained"
        );

        let shares = round_shares(req.notional, quote.last_price);
        if shares <= Decimal::ZERO {
            return Err(self.reject(
                &req,
                GatewayError::SizeTooSmall {
                    notional: req.notional,
                    price: quote.last_price,
                },
            ));
        }
        debug!(ticker = %req.ticker, shares = %shares, stage = %OrderStage::Sized, "Order sized");

        // One idempotency key per intent, reused across retries.
        let cloid = ClientOrderId::new();
        let submit = SubmitOrder {
            cloid,
            ticker: req.ticker.clone(),
            side: req.side,
            quantity: shares,
            order_type: req.order_type,
            limit_price: req.limit_price,
            time_in_force: req.time_in_force,
        };

        let ack = self
            .retry
            .execute_classified(
                deadline,
                |e| matches!(e, SubmitError::Broker(b) if b.is_retryable()),
                || {
                    let order = submit.clone();
                    async move {
                        match deadline {
                            Some(d) => self
                                .rate_limiter
                                .acquire_until(d)
                                .await
                                .map_err(|_| SubmitError::Deadline)?,
                            None => self.rate_limiter.acquire().await,
                        }
                        self.broker
                            .submit_order(order)
                            .await
                            .map_err(SubmitError::Broker)
                    }
                },
            )
            .await
            .map_err(|e| self.submission_failed(&req, e))?;

        // Exactly once per submitted order; never on a rejected or failed
        // attempt. Realized P&L of an opening trade is zero.
        self.safety.record_trade(Decimal::ZERO);

        ORDERS_SUBMITTED_TOTAL
            .with_label_values(&[req.ticker.as_str(), req.side.to_string().as_str()])
            .inc();
        info!(
            ticker = %req.ticker,
            side = %req.side,
            shares = %shares,
            order_id = %ack.order_id,
            state = %ack.state,
            stage = %OrderStage::Confirmed,
            "Order placed successfully"
        );

        Ok(OrderResult {
            order_id: ack.order_id,
            status: OrderStatus::Submitted,
            shares_requested: shares,
        })
    }

    /// Read-only account snapshot; rate-limited, no safety gating.
    pub async fn get_account_info(&self) -> GatewayResult<AccountInfo> {
        self.fetch_account(None).await
    }

    /// Read-only holdings: open positions joined with cached quote prices.
    ///
    /// Rate-limited, no safety gating, never mutates safety state. A
    /// position whose quote cannot be fetched is reported without a
    /// current price rather than dropped.
    pub async fn get_holdings(&self) -> GatewayResult<Vec<Holding>> {
        self.rate_limiter.acquire().await;
        let positions = self
            .broker
            .get_positions()
            .await
            .map_err(GatewayError::AccountUnavailable)?;

        let mut holdings = Vec::with_capacity(positions.len());
        for position in positions {
            if position.quantity <= Decimal::ZERO {
                continue;
            }
            let current_price = match self.quotes.get_quote(&position.symbol).await {
                Ok(Quote { last_price, .. }) => Some(last_price),
                Err(e) => {
                    warn!(symbol = %position.symbol, error = %e, "No current price for holding");
                    None
                }
            };
            holdings.push(Holding {
                symbol: position.symbol,
                quantity: position.quantity,
                average_buy_price: position.average_buy_price,
                current_price,
                intraday_pl_pct: position.intraday_pl_pct,
            });
        }
        Ok(holdings)
    }

    /// Whether the canonical exchange is currently in a trading session.
    pub async fn is_market_open(&self) -> Result<bool, BrokerError> {
        self.quotes.is_market_open().await
    }

    async fn fetch_account(&self, deadline: Option<Instant>) -> GatewayResult<AccountInfo> {
        match deadline {
            Some(d) => self
                .rate_limiter
                .acquire_until(d)
                .await
                .map_err(|_| GatewayError::Timeout)?,
            None => self.rate_limiter.acquire().await,
        }
        self.broker.get_account_info().await.map_err(|e| {
            warn!(error = %e, "Could not fetch account information");
            GatewayError::AccountUnavailable(e)
        })
    }

    fn reject(&self, req: &OrderRequest, err: GatewayError) -> GatewayError {
        ORDERS_REJECTED_TOTAL.with_label_values(&[err.reason()]).inc();
        warn!(
            ticker = %req.ticker,
            reason = err.reason(),
            error = %err,
            stage = %OrderStage::Rejected,
            "Order rejected"
        );
        err
    }

    fn submission_failed(&self, req: &OrderRequest, err: RetryError<SubmitError>) -> GatewayError {
        let mapped = match err {
            RetryError::Permanent {
                source: SubmitError::Deadline,
                ..
            }
            | RetryError::DeadlineExceeded => GatewayError::Timeout,
            RetryError::Permanent {
                attempts,
                source: SubmitError::Broker(e),
            } => GatewayError::SubmissionFailed {
                attempts,
                source: e,
            },
            RetryError::Exhausted {
                attempts,
                source: SubmitError::Broker(e),
            } => GatewayError::SubmissionFailed {
                attempts,
                source: e,
            },
            // Deadline errors are classified non-retryable, so they cannot
            // exhaust the budget.
            RetryError::Exhausted {
                source: SubmitError::Deadline,
                ..
            } => GatewayError::Timeout,
        };

        if matches!(mapped, GatewayError::SubmissionFailed { .. }) {
            ORDERS_FAILED_TOTAL.inc();
        }
        warn!(
            ticker = %req.ticker,
            error = %mapped,
            stage = %OrderStage::Failed,
            "Order submission failed"
        );
        mapped
    }
}
