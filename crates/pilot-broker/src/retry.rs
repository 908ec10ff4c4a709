//! Bounded retries with exponential backoff.
//!
//! The policy is a stateless parameterization of a single call: attempt,
//! sleep `initial_delay * multiplier^(attempt-1)`, attempt again, up to
//! `max_attempts` total attempts. It applies retries uniformly; callers
//! classify which errors are worth retrying (see
//! [`BrokerError::is_retryable`](crate::BrokerError::is_retryable)) and
//! pass the classification in, so a doomed validation failure is never
//! retried.
//!
//! An attempt already in flight is always awaited to completion; deadlines
//! are only honored at suspension points (between attempts, during backoff
//! sleeps).

use std::future::Future;
use std::time::Duration;

use pilot_telemetry::metrics::RETRY_ATTEMPTS_TOTAL;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{error, warn};

/// Failure modes of a retried operation.
#[derive(Debug, Error)]
pub enum RetryError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// The operation failed with an error classified as not retryable.
    /// Surfaced immediately, without further attempts; `attempts` counts
    /// the calls made before the permanent failure landed.
    #[error("permanent failure on attempt {attempts}: {source}")]
    Permanent {
        attempts: u32,
        #[source]
        source: E,
    },

    /// Every attempt failed; `source` is the last failure.
    #[error("gave up after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: E,
    },

    /// Deadline hit at a suspension point before the operation completed.
    #[error("deadline exceeded before the operation completed")]
    DeadlineExceeded,
}

/// Retry policy: bounded attempts with exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first (>= 1).
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt (>= 1).
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, backoff_multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            backoff_multiplier: backoff_multiplier.max(1.0),
        }
    }

    /// Run `op`, retrying every failure uniformly.
    pub async fn execute<T, E, F, Fut>(&self, op: F) -> Result<T, RetryError<E>>
    where
        E: std::error::Error + Send + Sync + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_classified(None, |_| true, op).await
    }

    /// Run `op`, retrying only failures for which `retryable` returns true,
    /// and giving up at `deadline` if one is set.
    ///
    /// A deadline is only checked between attempts and is allowed to cut a
    /// backoff sleep short; it never cancels an attempt already issued.
    pub async fn execute_classified<T, E, F, Fut>(
        &self,
        deadline: Option<Instant>,
        retryable: impl Fn(&E) -> bool,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        E: std::error::Error + Send + Sync + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut delay = self.initial_delay;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !retryable(&e) => {
                    warn!(attempt, error = %e, "Operation failed with permanent error");
                    return Err(RetryError::Permanent {
                        attempts: attempt,
                        source: e,
                    });
                }
                Err(e) if attempt >= self.max_attempts => {
                    error!(
                        attempts = attempt,
                        error = %e,
                        "Giving up after final attempt"
                    );
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        source: e,
                    });
                }
                Err(e) => {
                    RETRY_ATTEMPTS_TOTAL.inc();
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, will retry"
                    );

                    match deadline {
                        Some(d) if Instant::now() + delay > d => {
                            return Err(RetryError::DeadlineExceeded);
                        }
                        _ => sleep(delay).await,
                    }
                    delay = Duration::from_secs_f64(delay.as_secs_f64() * self.backoff_multiplier);
                }
            }
        }
    }
}
