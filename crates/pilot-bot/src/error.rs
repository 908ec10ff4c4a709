//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Broker error: {0}")]
    Broker(#[from] pilot_broker::BrokerError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] pilot_gateway::GatewayError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] pilot_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
