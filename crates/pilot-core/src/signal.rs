//! Trade signals from the signal-source collaborator.
//!
//! The OCR/LLM pipeline that extracts trade commands from chat messages is
//! an external collaborator; it hands the automated loop a stream of these
//! structures over an mpsc channel.

use crate::order::OrderSide;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single extracted trade command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeSignal {
    /// Ticker symbol to trade.
    pub ticker: String,
    /// Buy or sell.
    pub command: OrderSide,
    /// Notional dollar amount.
    pub amount: Decimal,
}

impl TradeSignal {
    pub fn new(ticker: impl Into<String>, command: OrderSide, amount: Decimal) -> Self {
        Self {
            ticker: ticker.into(),
            command,
            amount,
        }
    }
}
