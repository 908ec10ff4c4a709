//! HTTP client for the brokerage REST API.
//!
//! Thin transport layer: one upstream call per method, JSON in and out,
//! wire shapes mapped into the core domain types. Session acquisition is
//! external; this client is handed a bearer token at construction.

use std::time::Duration;

use chrono::{DateTime, Utc};
use pilot_core::{AccountInfo, MarketHours, OrderType, Position, Quote};
use reqwest::{Client, RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::{BoxFuture, BrokerClient, OrderAck, SubmitOrder};
use crate::error::{BrokerError, BrokerResult};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Account snapshot wire shape (decimals arrive as strings).
#[derive(Debug, Deserialize)]
struct AccountResponse {
    #[serde(with = "rust_decimal::serde::str")]
    cash_available: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    buying_power: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    portfolio_value: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    market_value: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    day_pl_pct: Decimal,
}

#[derive(Debug, Deserialize)]
struct QuoteEntry {
    symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    last_trade_price: Decimal,
    tradable: bool,
}

#[derive(Debug, Deserialize)]
struct QuotesResponse {
    results: Vec<QuoteEntry>,
}

#[derive(Debug, Deserialize)]
struct MarketHoursEntry {
    market: String,
    is_open: bool,
    next_open_hours: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct MarketHoursResponse {
    results: Vec<MarketHoursEntry>,
}

#[derive(Debug, Serialize)]
struct OrderBody<'a> {
    client_order_id: &'a str,
    symbol: &'a str,
    side: &'a str,
    #[serde(with = "rust_decimal::serde::str")]
    quantity: Decimal,
    #[serde(rename = "type")]
    order_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit_price: Option<String>,
    time_in_force: String,
    extended_hours: bool,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    state: String,
}

#[derive(Debug, Deserialize)]
struct PositionEntry {
    symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    quantity: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    average_buy_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    intraday_percentage: Decimal,
}

#[derive(Debug, Deserialize)]
struct PositionsResponse {
    results: Vec<PositionEntry>,
}

/// reqwest-backed brokerage client.
pub struct RestBrokerClient {
    client: Client,
    base_url: String,
    auth_token: String,
}

impl RestBrokerClient {
    /// Create a new client against `base_url` with a session bearer token.
    pub fn new(base_url: impl Into<String>, auth_token: impl Into<String>) -> BrokerResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| BrokerError::Http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token: auth_token.into(),
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.auth_token)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.auth_token)
    }

    /// Map an unsuccessful status into the error taxonomy.
    fn status_error(status: StatusCode, body: String) -> BrokerError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                BrokerError::Auth(format!("HTTP {status}: {body}"))
            }
            StatusCode::TOO_MANY_REQUESTS => BrokerError::Throttled(format!("HTTP {status}: {body}")),
            s if s.is_client_error() => BrokerError::Rejected(format!("HTTP {status}: {body}")),
            _ => BrokerError::Http(format!("HTTP {status}: {body}")),
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> BrokerResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, body));
        }
        response
            .json()
            .await
            .map_err(|e| BrokerError::InvalidResponse(format!("Failed to parse response: {e}")))
    }
}

impl BrokerClient for RestBrokerClient {
    fn get_account_info(&self) -> BoxFuture<'_, BrokerResult<AccountInfo>> {
        Box::pin(async move {
            debug!("Fetching account snapshot");
            let response = self.get("/account").send().await?;
            let account: AccountResponse = Self::decode(response).await?;
            Ok(AccountInfo {
                cash_available: account.cash_available,
                buying_power: account.buying_power,
                portfolio_value: account.portfolio_value,
                market_value: account.market_value,
                day_pl_pct: account.day_pl_pct,
            })
        })
    }

    fn get_quotes<'a>(&'a self, symbols: &'a [String]) -> BoxFuture<'a, BrokerResult<Vec<Quote>>> {
        Box::pin(async move {
            debug!(symbols = ?symbols, "Fetching quotes");
            let response = self
                .get("/quotes")
                .query(&[("symbols", symbols.join(","))])
                .send()
                .await?;
            let quotes: QuotesResponse = Self::decode(response).await?;
            Ok(quotes
                .results
                .into_iter()
                .map(|q| Quote::new(q.symbol, q.last_trade_price, q.tradable))
                .collect())
        })
    }

    fn get_market_hours(&self) -> BoxFuture<'_, BrokerResult<Vec<MarketHours>>> {
        Box::pin(async move {
            debug!("Fetching market hours");
            let response = self.get("/markets/hours").send().await?;
            let hours: MarketHoursResponse = Self::decode(response).await?;
            Ok(hours
                .results
                .into_iter()
                .map(|h| MarketHours {
                    exchange: h.market,
                    is_open: h.is_open,
                    next_open: h.next_open_hours,
                })
                .collect())
        })
    }

    fn submit_order(&self, order: SubmitOrder) -> BoxFuture<'_, BrokerResult<OrderAck>> {
        Box::pin(async move {
            let side = order.side.to_string();
            let order_type = order.order_type.to_string();
            let body = OrderBody {
                client_order_id: order.cloid.as_str(),
                symbol: &order.ticker,
                side: &side,
                quantity: order.quantity,
                order_type: &order_type,
                limit_price: order.limit_price.map(|p| p.to_string()),
                time_in_force: order.time_in_force.to_string(),
                extended_hours: false,
            };
            debug_assert!(
                order.order_type == OrderType::Market || order.limit_price.is_some(),
                "limit orders must carry a limit price"
            );

            info!(
                cloid = %order.cloid,
                ticker = %order.ticker,
                side = %order.side,
                quantity = %order.quantity,
                order_type = %order.order_type,
                "Submitting order"
            );

            let response = self.post("/orders").json(&body).send().await?;
            let ack: OrderResponse = Self::decode(response).await?;
            if ack.id.is_empty() {
                return Err(BrokerError::InvalidResponse(
                    "order response missing id".to_string(),
                ));
            }
            Ok(OrderAck {
                order_id: ack.id,
                state: ack.state,
            })
        })
    }

    fn get_positions(&self) -> BoxFuture<'_, BrokerResult<Vec<Position>>> {
        Box::pin(async move {
            debug!("Fetching positions");
            let response = self.get("/positions").send().await?;
            let positions: PositionsResponse = Self::decode(response).await?;
            Ok(positions
                .results
                .into_iter()
                .map(|p| Position {
                    symbol: p.symbol,
                    quantity: p.quantity,
                    average_buy_price: p.average_buy_price,
                    intraday_pl_pct: p.intraday_percentage,
                })
                .collect())
        })
    }

    fn logout(&self) -> BoxFuture<'_, BrokerResult<()>> {
        Box::pin(async move {
            let response = self.post("/logout").send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Self::status_error(status, body));
            }
            info!("Brokerage session ended");
            Ok(())
        })
    }
}
