//! Account and position snapshots from the brokerage.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Account snapshot used for safety gating and display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Cash available for investment.
    pub cash_available: Decimal,
    /// Buying power (may exceed cash on margin accounts).
    pub buying_power: Decimal,
    /// Total portfolio equity. Position-size limits key off this value.
    pub portfolio_value: Decimal,
    /// Market value of held positions.
    pub market_value: Decimal,
    /// Day P&L percentage as reported by the brokerage.
    pub day_pl_pct: Decimal,
}

/// An open position as reported by the brokerage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Ticker symbol.
    pub symbol: String,
    /// Share quantity held.
    pub quantity: Decimal,
    /// Average buy-in price.
    pub average_buy_price: Decimal,
    /// Intraday P&L percentage.
    pub intraday_pl_pct: Decimal,
}

/// A position joined with its current quote price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    /// Ticker symbol.
    pub symbol: String,
    /// Share quantity held.
    pub quantity: Decimal,
    /// Average buy-in price.
    pub average_buy_price: Decimal,
    /// Current price from the quote cache, when available.
    pub current_price: Option<Decimal>,
    /// Intraday P&L percentage.
    pub intraday_pl_pct: Decimal,
}
