//! Application configuration.
//!
//! Loaded from a TOML file, with the safety limits overridable through
//! environment variables so deployments can tighten them without editing
//! the file.

use crate::error::{AppError, AppResult};
use pilot_broker::RetryPolicy;
use pilot_gateway::{QuoteCacheConfig, SafetyConfig};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Brokerage connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// REST API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the bearer token. The token itself
    /// never lives in the config file.
    #[serde(default = "default_auth_token_env")]
    pub auth_token_env: String,
}

fn default_base_url() -> String {
    "https://api.robinhood.com".to_string()
}

fn default_auth_token_env() -> String {
    "PILOT_AUTH_TOKEN".to_string()
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            auth_token_env: default_auth_token_env(),
        }
    }
}

/// Sliding-window rate limit shared by all brokerage calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum calls per window. Default: 60.
    #[serde(default = "default_max_calls")]
    pub max_calls: u32,
    /// Window length in seconds. Default: 60.
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,
}

fn default_max_calls() -> u32 {
    60
}

fn default_period_secs() -> u64 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls: default_max_calls(),
            period_secs: default_period_secs(),
        }
    }
}

/// Quote cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteConfig {
    /// Entry lifetime in seconds. Default: 5.
    #[serde(default = "default_quote_ttl_secs")]
    pub ttl_secs: u64,
    /// Canonical exchange for market-hours checks. Default: "NASDAQ".
    #[serde(default = "default_exchange")]
    pub exchange: String,
}

fn default_quote_ttl_secs() -> u64 {
    5
}

fn default_exchange() -> String {
    "NASDAQ".to_string()
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_quote_ttl_secs(),
            exchange: default_exchange(),
        }
    }
}

/// Submission retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first. Default: 3.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt, in seconds. Default: 5.
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,
    /// Backoff multiplier applied after each failure. Default: 2.0.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_secs() -> u64 {
    5
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_secs: default_initial_delay_secs(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// Safety limits. Each field has an environment override so operators can
/// tighten limits without a config rollout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetySection {
    /// Floor for accumulated daily realized P&L (negative USD). Default: -1000.
    #[serde(default = "default_daily_loss_limit")]
    pub daily_loss_limit: Decimal,
    /// Maximum trade notional as a fraction of portfolio value. Default: 0.1.
    #[serde(default = "default_position_size_limit")]
    pub position_size_limit: Decimal,
    /// Minimum seconds between trades. Default: 300.
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
    /// Maximum trades per session. Default: 10.
    #[serde(default = "default_trade_limit_per_session")]
    pub trade_limit_per_session: u32,
}

fn default_daily_loss_limit() -> Decimal {
    Decimal::from(-1000)
}

fn default_position_size_limit() -> Decimal {
    Decimal::new(1, 1) // 0.1
}

fn default_cooldown_seconds() -> u64 {
    300
}

fn default_trade_limit_per_session() -> u32 {
    10
}

impl Default for SafetySection {
    fn default() -> Self {
        Self {
            daily_loss_limit: default_daily_loss_limit(),
            position_size_limit: default_position_size_limit(),
            cooldown_seconds: default_cooldown_seconds(),
            trade_limit_per_session: default_trade_limit_per_session(),
        }
    }
}

/// Signal loop pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Sleep before re-checking market hours when the market is closed,
    /// in seconds. Default: 300.
    #[serde(default = "default_closed_market_sleep_secs")]
    pub closed_market_sleep_secs: u64,
}

fn default_closed_market_sleep_secs() -> u64 {
    300
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            closed_market_sleep_secs: default_closed_market_sleep_secs(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Brokerage connection.
    #[serde(default)]
    pub broker: BrokerConfig,
    /// API rate limit.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Quote cache.
    #[serde(default)]
    pub quotes: QuoteConfig,
    /// Submission retries.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Safety limits.
    #[serde(default)]
    pub safety: SafetySection,
    /// Signal loop pacing.
    #[serde(default, rename = "loop")]
    pub signal_loop: LoopConfig,
}

impl AppConfig {
    /// Load configuration, resolving the path as CLI arg > `PILOT_CONFIG`
    /// env var > `config/default.toml`, falling back to defaults when the
    /// file does not exist, then apply environment overrides and validate.
    pub fn load(cli_path: Option<String>) -> AppResult<Self> {
        let config_path = cli_path
            .or_else(|| std::env::var("PILOT_CONFIG").ok())
            .unwrap_or_else(|| "config/default.toml".to_string());

        tracing::info!(config_path = %config_path, "Loading configuration");

        let mut config = if Path::new(&config_path).exists() {
            Self::from_file(&config_path)?
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific file. Environment overrides are not applied.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Apply safety-limit overrides from the environment. An override that
    /// is present but unparseable is a hard error, never a silent fallback.
    pub fn apply_env_overrides(&mut self) -> AppResult<()> {
        if let Some(v) = env_override::<Decimal>("DAILY_LOSS_LIMIT")? {
            self.safety.daily_loss_limit = v;
        }
        if let Some(v) = env_override::<Decimal>("POSITION_SIZE_LIMIT")? {
            self.safety.position_size_limit = v;
        }
        if let Some(v) = env_override::<u64>("TRADE_COOLDOWN_SECONDS")? {
            self.safety.cooldown_seconds = v;
        }
        if let Some(v) = env_override::<u32>("TRADE_LIMIT_PER_SESSION")? {
            self.safety.trade_limit_per_session = v;
        }
        Ok(())
    }

    /// Reject configurations that would disable a guard or stall the loop.
    pub fn validate(&self) -> AppResult<()> {
        if self.broker.base_url.is_empty() {
            return Err(AppError::Config("broker.base_url must be set".to_string()));
        }
        if self.rate_limit.max_calls == 0 {
            return Err(AppError::Config(
                "rate_limit.max_calls must be at least 1".to_string(),
            ));
        }
        if self.rate_limit.period_secs == 0 {
            return Err(AppError::Config(
                "rate_limit.period_secs must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(AppError::Config(
                "retry.backoff_multiplier must be >= 1.0".to_string(),
            ));
        }
        if self.safety.daily_loss_limit > Decimal::ZERO {
            return Err(AppError::Config(
                "safety.daily_loss_limit must be zero or negative".to_string(),
            ));
        }
        if self.safety.position_size_limit <= Decimal::ZERO
            || self.safety.position_size_limit > Decimal::ONE
        {
            return Err(AppError::Config(
                "safety.position_size_limit must be in (0, 1]".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the bearer token from the configured environment variable.
    pub fn auth_token(&self) -> AppResult<String> {
        std::env::var(&self.broker.auth_token_env).map_err(|_| {
            AppError::Config(format!(
                "auth token env var {} is not set",
                self.broker.auth_token_env
            ))
        })
    }

    pub fn rate_limit_period(&self) -> Duration {
        Duration::from_secs(self.rate_limit.period_secs)
    }

    pub fn quote_cache_config(&self) -> QuoteCacheConfig {
        QuoteCacheConfig {
            ttl: Duration::from_secs(self.quotes.ttl_secs),
            exchange: self.quotes.exchange.clone(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_secs(self.retry.initial_delay_secs),
            self.retry.backoff_multiplier,
        )
    }

    pub fn safety_config(&self) -> SafetyConfig {
        SafetyConfig {
            daily_loss_limit: self.safety.daily_loss_limit,
            position_size_limit: self.safety.position_size_limit,
            cooldown_period: Duration::from_secs(self.safety.cooldown_seconds),
            trade_limit_per_session: self.safety.trade_limit_per_session,
        }
    }

    pub fn closed_market_sleep(&self) -> Duration {
        Duration::from_secs(self.signal_loop.closed_market_sleep_secs)
    }
}

fn env_override<T: std::str::FromStr>(name: &str) -> AppResult<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw.parse::<T>().map(Some).map_err(|_| {
            AppError::Config(format!("invalid value for {name}: {raw:?}"))
        }),
        Err(_) => Ok(None),
    }
}
