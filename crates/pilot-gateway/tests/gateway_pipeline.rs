//! End-to-end tests of the order pipeline against a scripted broker.
//!
//! The broker mock records every call and pops scripted submission
//! results, so tests can assert both outcomes and call counts (e.g. a
//! rejected order must never reach the brokerage).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pilot_broker::{
    BoxFuture, BrokerClient, BrokerError, BrokerResult, OrderAck, RateLimiter, RetryPolicy,
    SubmitOrder,
};
use pilot_core::{
    AccountInfo, MarketHours, OrderRequest, OrderSide, OrderStatus, Position, Quote,
};
use pilot_gateway::{
    ExecutionGateway, GatewayError, QuoteCache, QuoteCacheConfig, SafetyConfig, SafetyManager,
    SafetyViolation,
};
use pilot_telemetry::metrics::ORDERS_REJECTED_TOTAL;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::time::advance;

/// Scripted brokerage backend with per-method call counters.
#[derive(Default)]
struct RecordingBroker {
    account: Mutex<Option<AccountInfo>>,
    quotes: Mutex<Vec<Quote>>,
    fail_quotes: AtomicBool,
    market_hours: Mutex<Vec<MarketHours>>,
    positions: Mutex<Vec<Position>>,
    /// Results popped per submit call; empty means default success.
    submit_script: Mutex<VecDeque<BrokerResult<OrderAck>>>,
    submitted: Mutex<Vec<SubmitOrder>>,
    account_calls: AtomicU32,
    quote_calls: AtomicU32,
    submit_calls: AtomicU32,
    position_calls: AtomicU32,
}

impl RecordingBroker {
    fn with_account(portfolio_value: Decimal) -> Self {
        let broker = Self::default();
        *broker.account.lock() = Some(AccountInfo {
            cash_available: dec!(5000),
            buying_power: dec!(5000),
            portfolio_value,
            market_value: portfolio_value,
            day_pl_pct: Decimal::ZERO,
        });
        broker
    }

    fn set_quote(&self, symbol: &str, last_price: Decimal, tradable: bool) {
        let mut quotes = self.quotes.lock();
        quotes.retain(|q| q.symbol != symbol);
        quotes.push(Quote::new(symbol, last_price, tradable));
    }

    fn script_submit(&self, results: Vec<BrokerResult<OrderAck>>) {
        *self.submit_script.lock() = results.into();
    }

    fn ack(id: &str) -> OrderAck {
        OrderAck {
            order_id: id.to_string(),
            state: "confirmed".to_string(),
        }
    }
}

impl BrokerClient for RecordingBroker {
    fn get_account_info(&self) -> BoxFuture<'_, BrokerResult<AccountInfo>> {
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        let result = self
            .account
            .lock()
            .clone()
            .ok_or_else(|| BrokerError::Http("account endpoint down".to_string()));
        Box::pin(async move { result })
    }

    fn get_quotes<'a>(&'a self, symbols: &'a [String]) -> BoxFuture<'a, BrokerResult<Vec<Quote>>> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        let result = if self.fail_quotes.load(Ordering::SeqCst) {
            Err(BrokerError::Http("quote endpoint down".to_string()))
        } else {
            Ok(self
                .quotes
                .lock()
                .iter()
                .filter(|q| symbols.contains(&q.symbol))
                .cloned()
                .collect())
        };
        Box::pin(async move { result })
    }

    fn get_market_hours(&self) -> BoxFuture<'_, BrokerResult<Vec<MarketHours>>> {
        let hours = self.market_hours.lock().clone();
        Box::pin(async move { Ok(hours) })
    }

    fn submit_order(&self, order: SubmitOrder) -> BoxFuture<'_, BrokerResult<OrderAck>> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().push(order);
        let result = self
            .submit_script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(Self::ack("X")));
        Box::pin(async move { result })
    }

    fn get_positions(&self) -> BoxFuture<'_, BrokerResult<Vec<Position>>> {
        self.position_calls.fetch_add(1, Ordering::SeqCst);
        let positions = self.positions.lock().clone();
        Box::pin(async move { Ok(positions) })
    }

    fn logout(&self) -> BoxFuture<'_, BrokerResult<()>> {
        Box::pin(async move { Ok(()) })
    }
}

struct Harness {
    broker: Arc<RecordingBroker>,
    safety: Arc<SafetyManager>,
    gateway: ExecutionGateway,
}

fn harness(broker: RecordingBroker, safety_config: SafetyConfig, retry: RetryPolicy) -> Harness {
    let broker = Arc::new(broker);
    let rate_limiter = Arc::new(RateLimiter::new(60, Duration::from_secs(60)));
    let safety = Arc::new(SafetyManager::new(safety_config));
    let quotes = QuoteCache::new(
        QuoteCacheConfig::default(),
        broker.clone() as Arc<dyn BrokerClient>,
        rate_limiter.clone(),
    );
    let gateway = ExecutionGateway::new(
        broker.clone() as Arc<dyn BrokerClient>,
        rate_limiter,
        quotes,
        retry,
        safety.clone(),
    );
    Harness {
        broker,
        safety,
        gateway,
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_secs(5), 2.0)
}

#[tokio::test(start_paused = true)]
async fn market_buy_sizes_submits_and_records() {
    let broker = RecordingBroker::with_account(dec!(100000));
    broker.set_quote("AAPL", dec!(100.00), true);
    let h = harness(broker, SafetyConfig::default(), fast_retry());

    let result = h
        .gateway
        .place_order(OrderRequest::market("AAPL", OrderSide::Buy, dec!(1000)))
        .await
        .unwrap();

    assert_eq!(result.order_id, "X");
    assert_eq!(result.status, OrderStatus::Submitted);
    assert_eq!(result.shares_requested, dec!(10.0000));

    // Exactly one submission with the computed quantity.
    assert_eq!(h.broker.submit_calls.load(Ordering::SeqCst), 1);
    let submitted = h.broker.submitted.lock();
    assert_eq!(submitted[0].quantity, dec!(10.0000));
    assert_eq!(submitted[0].ticker, "AAPL");

    // record_trade invoked exactly once.
    assert_eq!(h.safety.trade_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn untradable_symbol_is_rejected_without_submission() {
    let broker = RecordingBroker::with_account(dec!(100000));
    broker.set_quote("HALT", dec!(10.00), false);
    let h = harness(broker, SafetyConfig::default(), fast_retry());

    let err = h
        .gateway
        .place_order(OrderRequest::market("HALT", OrderSide::Buy, dec!(100)))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::NotTradable { .. }));
    assert_eq!(h.broker.submit_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.safety.trade_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn safety_rejection_skips_quote_and_submission() {
    let broker = RecordingBroker::with_account(dec!(10000));
    broker.set_quote("AAPL", dec!(100.00), true);
    let h = harness(broker, SafetyConfig::default(), fast_retry());

    // 2000 > 10000 * 0.1
    let err = h
        .gateway
        .place_order(OrderRequest::market("AAPL", OrderSide::Buy, dec!(2000)))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        GatewayError::SafetyRejected(SafetyViolation::PositionSizeExceeded)
    ));
    assert_eq!(h.broker.quote_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.broker.submit_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn missing_limit_price_rejected_before_any_broker_call() {
    let broker = RecordingBroker::with_account(dec!(100000));
    let h = harness(broker, SafetyConfig::default(), fast_retry());

    let mut req = OrderRequest::market("AAPL", OrderSide::Buy, dec!(1000));
    req.order_type = pilot_core::OrderType::Limit;

    let err = h.gateway.place_order(req).await.unwrap_err();
    assert!(matches!(err, GatewayError::MissingLimitPrice));
    assert_eq!(h.broker.account_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.broker.submit_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn dust_notional_is_rejected_as_too_small() {
    let broker = RecordingBroker::with_account(dec!(100000));
    broker.set_quote("BRK.A", dec!(1000000), true);
    let h = harness(broker, SafetyConfig::default(), fast_retry());

    let err = h
        .gateway
        .place_order(OrderRequest::market("BRK.A", OrderSide::Buy, dec!(0.01)))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::SizeTooSmall { .. }));
    assert_eq!(h.broker.submit_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn transient_submission_failures_are_retried_to_success() {
    let broker = RecordingBroker::with_account(dec!(100000));
    broker.set_quote("AAPL", dec!(100.00), true);
    broker.script_submit(vec![
        Err(BrokerError::Http("connection reset".to_string())),
        Err(BrokerError::Timeout("10s elapsed".to_string())),
        Ok(RecordingBroker::ack("retried")),
    ]);
    let h = harness(broker, SafetyConfig::default(), fast_retry());

    let result = h
        .gateway
        .place_order(OrderRequest::market("AAPL", OrderSide::Buy, dec!(1000)))
        .await
        .unwrap();

    assert_eq!(result.order_id, "retried");
    assert_eq!(h.broker.submit_calls.load(Ordering::SeqCst), 3);
    assert_eq!(h.safety.trade_count(), 1);

    // Every retry reused the same client order id.
    let submitted = h.broker.submitted.lock();
    assert_eq!(submitted[0].cloid, submitted[1].cloid);
    assert_eq!(submitted[1].cloid, submitted[2].cloid);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_fail_without_recording() {
    let broker = RecordingBroker::with_account(dec!(100000));
    broker.set_quote("AAPL", dec!(100.00), true);
    broker.script_submit(vec![
        Err(BrokerError::Http("reset".to_string())),
        Err(BrokerError::Http("reset".to_string())),
        Err(BrokerError::Http("reset".to_string())),
    ]);
    let h = harness(broker, SafetyConfig::default(), fast_retry());

    let err = h
        .gateway
        .place_order(OrderRequest::market("AAPL", OrderSide::Buy, dec!(1000)))
        .await
        .unwrap_err();

    match err {
        GatewayError::SubmissionFailed { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected SubmissionFailed, got {other:?}"),
    }
    assert_eq!(h.broker.submit_calls.load(Ordering::SeqCst), 3);
    assert_eq!(h.safety.trade_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn permanent_rejection_is_not_retried() {
    let broker = RecordingBroker::with_account(dec!(100000));
    broker.set_quote("AAPL", dec!(100.00), true);
    broker.script_submit(vec![Err(BrokerError::Rejected(
        "insufficient buying power".to_string(),
    ))]);
    let h = harness(broker, SafetyConfig::default(), fast_retry());

    let err = h
        .gateway
        .place_order(OrderRequest::market("AAPL", OrderSide::Buy, dec!(1000)))
        .await
        .unwrap_err();

    match err {
        GatewayError::SubmissionFailed { attempts, .. } => assert_eq!(attempts, 1),
        other => panic!("expected SubmissionFailed, got {other:?}"),
    }
    assert_eq!(h.broker.submit_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.safety.trade_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn late_permanent_rejection_reports_true_attempt_count() {
    let broker = RecordingBroker::with_account(dec!(100000));
    broker.set_quote("AAPL", dec!(100.00), true);
    // Transient failure first, then a non-retryable rejection.
    broker.script_submit(vec![
        Err(BrokerError::Http("reset".to_string())),
        Err(BrokerError::Rejected("insufficient buying power".to_string())),
    ]);
    let h = harness(broker, SafetyConfig::default(), fast_retry());

    let err = h
        .gateway
        .place_order(OrderRequest::market("AAPL", OrderSide::Buy, dec!(1000)))
        .await
        .unwrap_err();

    match err {
        GatewayError::SubmissionFailed { attempts, .. } => assert_eq!(attempts, 2),
        other => panic!("expected SubmissionFailed, got {other:?}"),
    }
    assert_eq!(h.broker.submit_calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.safety.trade_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn deadline_during_backoff_times_out_after_first_attempt() {
    let broker = RecordingBroker::with_account(dec!(100000));
    broker.set_quote("AAPL", dec!(100.00), true);
    broker.script_submit(vec![
        Err(BrokerError::Http("reset".to_string())),
        Ok(RecordingBroker::ack("late")),
    ]);
    let h = harness(broker, SafetyConfig::default(), fast_retry());

    // The 5s backoff after the first failed attempt overruns a 2s deadline.
    let err = h
        .gateway
        .place_order_with_deadline(
            OrderRequest::market("AAPL", OrderSide::Buy, dec!(1000)),
            Duration::from_secs(2),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Timeout));
    assert_eq!(h.broker.submit_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.safety.trade_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn account_outage_stops_the_pipeline_early() {
    let broker = RecordingBroker::default(); // no account scripted
    broker.set_quote("AAPL", dec!(100.00), true);
    let h = harness(broker, SafetyConfig::default(), fast_retry());

    let rejected = ORDERS_REJECTED_TOTAL.with_label_values(&["account_unavailable"]);

    // A read-only account query fails without counting as an order rejection.
    let before = rejected.get();
    let err = h.gateway.get_account_info().await.unwrap_err();
    assert!(matches!(err, GatewayError::AccountUnavailable(_)));
    assert_eq!(rejected.get(), before);

    let err = h
        .gateway
        .place_order(OrderRequest::market("AAPL", OrderSide::Buy, dec!(1000)))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::AccountUnavailable(_)));
    assert_eq!(rejected.get(), before + 1.0);
    assert_eq!(h.broker.quote_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.broker.submit_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn quote_cache_serves_fresh_entries_without_refetch() {
    let broker = RecordingBroker::with_account(dec!(100000));
    broker.set_quote("NVDA", dec!(875.40), true);
    let config = SafetyConfig {
        cooldown_period: Duration::ZERO,
        ..SafetyConfig::default()
    };
    let h = harness(broker, config, fast_retry());

    // Two orders inside the TTL share one quote fetch.
    for _ in 0..2 {
        h.gateway
            .place_order(OrderRequest::market("NVDA", OrderSide::Buy, dec!(500)))
            .await
            .unwrap();
    }
    assert_eq!(h.broker.quote_calls.load(Ordering::SeqCst), 1);

    // Past the TTL the entry is refetched, not served stale.
    advance(Duration::from_secs(6)).await;
    h.gateway
        .place_order(OrderRequest::market("NVDA", OrderSide::Buy, dec!(500)))
        .await
        .unwrap();
    assert_eq!(h.broker.quote_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_quote_fetch_is_not_cached() {
    let broker = RecordingBroker::with_account(dec!(100000));
    broker.set_quote("AAPL", dec!(100.00), true);
    broker.fail_quotes.store(true, Ordering::SeqCst);
    let h = harness(broker, SafetyConfig::default(), fast_retry());

    let err = h
        .gateway
        .place_order(OrderRequest::market("AAPL", OrderSide::Buy, dec!(500)))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::QuoteUnavailable { .. }));

    // The failure was not cached: the next call fetches again and succeeds.
    h.broker.fail_quotes.store(false, Ordering::SeqCst);
    h.gateway
        .place_order(OrderRequest::market("AAPL", OrderSide::Buy, dec!(500)))
        .await
        .unwrap();
    assert_eq!(h.broker.quote_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn holdings_join_positions_with_quotes() {
    let broker = RecordingBroker::with_account(dec!(100000));
    broker.set_quote("AAPL", dec!(190.00), true);
    *broker.positions.lock() = vec![
        Position {
            symbol: "AAPL".to_string(),
            quantity: dec!(12.5),
            average_buy_price: dec!(150.00),
            intraday_pl_pct: dec!(1.2),
        },
        Position {
            symbol: "SOLD".to_string(),
            quantity: Decimal::ZERO,
            average_buy_price: dec!(10.00),
            intraday_pl_pct: Decimal::ZERO,
        },
    ];
    let h = harness(broker, SafetyConfig::default(), fast_retry());

    let holdings = h.gateway.get_holdings().await.unwrap();
    assert_eq!(holdings.len(), 1);
    assert_eq!(holdings[0].symbol, "AAPL");
    assert_eq!(holdings[0].current_price, Some(dec!(190.00)));
    assert_eq!(holdings[0].average_buy_price, dec!(150.00));

    // Read-only query: no safety mutation.
    assert_eq!(h.safety.trade_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn missing_exchange_counts_as_closed() {
    let broker = RecordingBroker::with_account(dec!(100000));
    *broker.market_hours.lock() = vec![MarketHours {
        exchange: "NYSE".to_string(),
        is_open: true,
        next_open: None,
    }];
    let h = harness(broker, SafetyConfig::default(), fast_retry());

    // Canonical exchange is NASDAQ; NYSE alone means closed.
    assert!(!h.gateway.is_market_open().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn session_cap_applies_across_orders() {
    let broker = RecordingBroker::with_account(dec!(100000));
    broker.set_quote("AAPL", dec!(100.00), true);
    let config = SafetyConfig {
        cooldown_period: Duration::ZERO,
        trade_limit_per_session: 2,
        ..SafetyConfig::default()
    };
    let h = harness(broker, config, fast_retry());

    for _ in 0..2 {
        h.gateway
            .place_order(OrderRequest::market("AAPL", OrderSide::Buy, dec!(100)))
            .await
            .unwrap();
    }

    let err = h
        .gateway
        .place_order(OrderRequest::market("AAPL", OrderSide::Buy, dec!(100)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GatewayError::SafetyRejected(SafetyViolation::SessionTradeLimit)
    ));
    assert_eq!(h.broker.submit_calls.load(Ordering::SeqCst), 2);
}
