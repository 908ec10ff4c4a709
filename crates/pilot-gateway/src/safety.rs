//! Safety-gating policy engine.
//!
//! Evaluates whether a proposed trade is permitted and tracks session
//! counters and realized P&L. Checks run cheapest-first and short-circuit
//! on the first violated limit:
//!
//! 1. Session trade cap
//! 2. Cooldown since the last trade
//! 3. Position size vs portfolio fraction
//! 4. Daily realized-loss floor
//!
//! `check` is a pure predicate; `record_trade` is the only mutator and is
//! called exactly once per successfully submitted order. Counters are
//! in-memory only: `trade_count` resets on process restart and
//! `daily_realized_pl` resets when the host signals a new trading day.
//! Cross-restart persistence of daily-loss tracking is deliberately not
//! attempted.

use std::time::Duration;

use parking_lot::Mutex;
use pilot_core::AccountInfo;
use pilot_telemetry::metrics::SAFETY_BLOCKED_TOTAL;
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Reason a proposed trade was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SafetyViolation {
    #[error("trade limit reached for session")]
    SessionTradeLimit,

    #[error("trade cooldown period not elapsed")]
    CooldownActive,

    #[error("trade size exceeds position limit")]
    PositionSizeExceeded,

    #[error("daily loss limit reached")]
    DailyLossLimit,
}

impl SafetyViolation {
    /// Metrics label for the violated limit.
    pub fn limit_label(&self) -> &'static str {
        match self {
            Self::SessionTradeLimit => "session_cap",
            Self::CooldownActive => "cooldown",
            Self::PositionSizeExceeded => "position_size",
            Self::DailyLossLimit => "daily_loss",
        }
    }
}

/// Fixed safety limits for one account session.
#[derive(Debug, Clone)]
pub struct SafetyConfig {
    /// Floor for accumulated daily realized P&L (negative).
    pub daily_loss_limit: Decimal,
    /// Maximum trade notional as a fraction of portfolio value, 0 < f <= 1.
    pub position_size_limit: Decimal,
    /// Minimum gap between consecutive trade submissions.
    pub cooldown_period: Duration,
    /// Maximum submitted trades per session.
    pub trade_limit_per_session: u32,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            daily_loss_limit: Decimal::from(-1000),
            position_size_limit: Decimal::new(1, 1), // 0.1
            cooldown_period: Duration::from_secs(300),
            trade_limit_per_session: 10,
        }
    }
}

#[derive(Debug, Default)]
struct SafetyState {
    last_trade_time: Option<Instant>,
    daily_realized_pl: Decimal,
    trade_count: u32,
}

/// Stateful policy engine gating every order.
///
/// One instance per account session, shared by reference between the
/// gateway and the host application.
pub struct SafetyManager {
    config: SafetyConfig,
    state: Mutex<SafetyState>,
}

impl SafetyManager {
    pub fn new(config: SafetyConfig) -> Self {
        Self {
            config,
            state: Mutex::new(SafetyState::default()),
        }
    }

    /// Evaluate whether a trade of `amount` is currently permitted.
    ///
    /// Pure predicate over current state and the supplied account snapshot;
    /// no side effects beyond logging and metrics. The violated limit is
    /// logged with its specific numbers.
    pub fn check(&self, account: &AccountInfo, amount: Decimal) -> Result<(), SafetyViolation> {
        let state = self.state.lock();

        if state.trade_count >= self.config.trade_limit_per_session {
            warn!(
                trade_count = state.trade_count,
                limit = self.config.trade_limit_per_session,
                "Trade limit reached for session"
            );
            return self.blocked(SafetyViolation::SessionTradeLimit);
        }

        if let Some(last) = state.last_trade_time {
            let since = last.elapsed();
            if since < self.config.cooldown_period {
                warn!(
                    since_last_ms = since.as_millis() as u64,
                    cooldown_ms = self.config.cooldown_period.as_millis() as u64,
                    "Trade cooldown period not elapsed"
                );
                return self.blocked(SafetyViolation::CooldownActive);
            }
        }

        let max_size = account.portfolio_value * self.config.position_size_limit;
        if amount > max_size {
            warn!(
                amount = %amount,
                max_size = %max_size,
                portfolio_value = %account.portfolio_value,
                "Trade size exceeds position limit"
            );
            return self.blocked(SafetyViolation::PositionSizeExceeded);
        }

        if state.daily_realized_pl < self.config.daily_loss_limit {
            warn!(
                daily_realized_pl = %state.daily_realized_pl,
                daily_loss_limit = %self.config.daily_loss_limit,
                "Daily loss limit reached"
            );
            return self.blocked(SafetyViolation::DailyLossLimit);
        }

        Ok(())
    }

    /// Convenience bool form of [`check`](Self::check).
    pub fn can_trade(&self, account: &AccountInfo, amount: Decimal) -> bool {
        self.check(account, amount).is_ok()
    }

    /// Record a successfully submitted trade. The only mutator.
    ///
    /// `realized_pl` is zero for opening trades; closing-trade P&L comes
    /// from the external ledger collaborator.
    pub fn record_trade(&self, realized_pl: Decimal) {
        let mut state = self.state.lock();
        state.last_trade_time = Some(Instant::now());
        state.daily_realized_pl += realized_pl;
        state.trade_count += 1;
        debug!(
            trade_count = state.trade_count,
            daily_realized_pl = %state.daily_realized_pl,
            "Trade recorded"
        );
    }

    /// Reset the daily P&L accumulator at a trading-day boundary.
    ///
    /// The day boundary is supplied by the host loop; session counters are
    /// unaffected.
    pub fn reset_daily(&self) {
        let mut state = self.state.lock();
        info!(
            previous_daily_pl = %state.daily_realized_pl,
            "Resetting daily realized P&L for new trading day"
        );
        state.daily_realized_pl = Decimal::ZERO;
    }

    /// Trades submitted this session.
    pub fn trade_count(&self) -> u32 {
        self.state.lock().trade_count
    }

    /// Accumulated realized P&L for the current trading day.
    pub fn daily_realized_pl(&self) -> Decimal {
        self.state.lock().daily_realized_pl
    }

    fn blocked(&self, violation: SafetyViolation) -> Result<(), SafetyViolation> {
        SAFETY_BLOCKED_TOTAL
            .with_label_values(&[violation.limit_label()])
            .inc();
        Err(violation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tokio::time::advance;

    fn account(portfolio_value: Decimal) -> AccountInfo {
        AccountInfo {
            cash_available: dec!(5000),
            buying_power: dec!(5000),
            portfolio_value,
            market_value: portfolio_value,
            day_pl_pct: Decimal::ZERO,
        }
    }

    #[test]
    fn test_position_size_limit() {
        let safety = SafetyManager::new(SafetyConfig::default());
        let acct = account(dec!(10000));

        assert!(safety.can_trade(&acct, dec!(500)));
        assert_eq!(
            safety.check(&acct, dec!(2000)),
            Err(SafetyViolation::PositionSizeExceeded)
        );
    }

    #[test]
    fn test_session_trade_limit() {
        let config = SafetyConfig {
            cooldown_period: Duration::ZERO,
            ..SafetyConfig::default()
        };
        let safety = SafetyManager::new(config.clone());
        let acct = account(dec!(10000));

        for _ in 0..config.trade_limit_per_session {
            safety.record_trade(Decimal::ZERO);
        }
        assert_eq!(
            safety.check(&acct, dec!(100)),
            Err(SafetyViolation::SessionTradeLimit)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_blocks_then_clears() {
        let safety = SafetyManager::new(SafetyConfig::default());
        let acct = account(dec!(10000));

        safety.record_trade(Decimal::ZERO);
        assert_eq!(
            safety.check(&acct, dec!(100)),
            Err(SafetyViolation::CooldownActive)
        );

        advance(Duration::from_secs(300)).await;
        assert!(safety.can_trade(&acct, dec!(100)));
    }

    #[test]
    fn test_daily_loss_limit() {
        let config = SafetyConfig {
            cooldown_period: Duration::ZERO,
            ..SafetyConfig::default()
        };
        let safety = SafetyManager::new(config);
        let acct = account(dec!(10000));

        safety.record_trade(dec!(-1500));
        assert_eq!(
            safety.check(&acct, dec!(100)),
            Err(SafetyViolation::DailyLossLimit)
        );

        safety.reset_daily();
        assert!(safety.can_trade(&acct, dec!(100)));
        // Session counters survive the daily reset.
        assert_eq!(safety.trade_count(), 1);
    }

    #[test]
    fn test_check_is_pure() {
        let safety = SafetyManager::new(SafetyConfig::default());
        let acct = account(dec!(10000));

        for _ in 0..50 {
            assert!(safety.can_trade(&acct, dec!(500)));
        }
        assert_eq!(safety.trade_count(), 0);
    }
}
