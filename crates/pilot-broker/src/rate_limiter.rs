//! Sliding-window rate limiting for brokerage API calls.
//!
//! One limiter instance is shared by every component that talks to the same
//! downstream quota (gateway, quote cache, account queries). Acquiring a
//! slot blocks until the call can be recorded without exceeding
//! `max_calls` in any trailing `period` window; it never fails, only delays.

use parking_lot::Mutex;
use pilot_telemetry::metrics::RATE_LIMIT_WAIT_SECONDS;
use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Deadline hit while waiting for a rate-limit slot. No call was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline exceeded while waiting for a rate-limit slot")]
pub struct DeadlineExceeded;

/// Sliding-window rate limiter.
pub struct RateLimiter {
    /// Maximum calls per window.
    max_calls: u32,
    /// Window duration.
    period: Duration,
    /// Timestamps of recorded calls, oldest first, pruned to the window.
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a new rate limiter.
    ///
    /// # Arguments
    /// * `max_calls` - Maximum calls per window (> 0)
    /// * `period` - Window duration
    pub fn new(max_calls: u32, period: Duration) -> Self {
        Self {
            max_calls,
            period,
            timestamps: Mutex::new(VecDeque::with_capacity(max_calls as usize)),
        }
    }

    /// Block until a call slot is available, then record the call.
    pub async fn acquire(&self) {
        let mut waited = Duration::ZERO;
        loop {
            match self.try_reserve() {
                None => {
                    if !waited.is_zero() {
                        RATE_LIMIT_WAIT_SECONDS.observe(waited.as_secs_f64());
                        debug!(waited_ms = waited.as_millis() as u64, "Rate-limit slot acquired after wait");
                    }
                    return;
                }
                Some(wait) => {
                    waited += wait;
                    sleep(wait).await;
                }
            }
        }
    }

    /// Like [`acquire`](Self::acquire), but gives up at `deadline`.
    ///
    /// Returns `Err(DeadlineExceeded)` without recording a call when the
    /// required wait would overrun the deadline.
    pub async fn acquire_until(&self, deadline: Instant) -> Result<(), DeadlineExceeded> {
        loop {
            match self.try_reserve() {
                None => return Ok(()),
                Some(wait) => {
                    if Instant::now() + wait > deadline {
                        return Err(DeadlineExceeded);
                    }
                    sleep(wait).await;
                }
            }
        }
    }

    /// Try to record a call now.
    ///
    /// Returns `None` on success, or the time to wait before the oldest
    /// in-window call expires. The deque is the critical section; the lock
    /// is never held across an await.
    fn try_reserve(&self) -> Option<Duration> {
        let now = Instant::now();
        let mut timestamps = self.timestamps.lock();

        while timestamps
            .front()
            .is_some_and(|&t| now.duration_since(t) >= self.period)
        {
            timestamps.pop_front();
        }

        if (timestamps.len() as u32) < self.max_calls {
            timestamps.push_back(now);
            if timestamps.len() as u32 == self.max_calls {
                warn!(
                    count = timestamps.len(),
                    max = self.max_calls,
                    "Rate limit window is full; further calls will wait"
                );
            }
            None
        } else {
            // Oldest in-window call frees a slot at oldest + period.
            let oldest = *timestamps.front().expect("window full implies non-empty");
            Some((oldest + self.period).saturating_duration_since(now))
        }
    }

    /// Calls currently recorded in the trailing window.
    pub fn current_count(&self) -> u32 {
        let now = Instant::now();
        let mut timestamps = self.timestamps.lock();
        while timestamps
            .front()
            .is_some_and(|&t| now.duration_since(t) >= self.period)
        {
            timestamps.pop_front();
        }
        timestamps.len() as u32
    }

    /// Remaining capacity in the trailing window.
    pub fn remaining_capacity(&self) -> u32 {
        self.max_calls.saturating_sub(self.current_count())
    }
}
