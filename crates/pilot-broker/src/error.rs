//! Broker error types and retryability classification.
//!
//! The retry policy itself has no opinion on which failures are transient;
//! callers classify errors with [`BrokerError::is_retryable`] and only route
//! retryable ones through a retry loop. Authentication failures are fatal so
//! the host process can halt instead of looping on doomed submissions.

use thiserror::Error;

/// Broker error types.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Transport-level failure (connection refused, DNS, TLS, 5xx).
    #[error("HTTP transport error: {0}")]
    Http(String),

    /// Request exceeded the client timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Upstream throttling (HTTP 429).
    #[error("Throttled by brokerage: {0}")]
    Throttled(String),

    /// Authentication or session failure (HTTP 401/403).
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The brokerage accepted the request but rejected its content.
    #[error("Rejected by brokerage: {0}")]
    Rejected(String),

    /// Response body could not be parsed into the expected shape.
    #[error("Invalid response payload: {0}")]
    InvalidResponse(String),
}

impl BrokerError {
    /// Whether a retry of the same call could plausibly succeed.
    ///
    /// Network blips, timeouts and upstream throttling are transient;
    /// auth failures, validation rejections and malformed payloads are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Timeout(_) | Self::Throttled(_)
        )
    }

    /// Whether this failure should halt the host process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

impl From<reqwest::Error> for BrokerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_decode() {
            Self::InvalidResponse(e.to_string())
        } else {
            Self::Http(e.to_string())
        }
    }
}

/// Result type alias for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_are_retryable() {
        assert!(BrokerError::Http("connection reset".into()).is_retryable());
        assert!(BrokerError::Timeout("10s elapsed".into()).is_retryable());
        assert!(BrokerError::Throttled("429".into()).is_retryable());
    }

    #[test]
    fn test_permanent_errors_are_not_retryable() {
        assert!(!BrokerError::Auth("expired token".into()).is_retryable());
        assert!(!BrokerError::Rejected("insufficient buying power".into()).is_retryable());
        assert!(!BrokerError::InvalidResponse("missing id".into()).is_retryable());
    }

    #[test]
    fn test_only_auth_is_fatal() {
        assert!(BrokerError::Auth("expired token".into()).is_fatal());
        assert!(!BrokerError::Http("reset".into()).is_fatal());
    }
}
