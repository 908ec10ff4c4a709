//! Quote and market-hours snapshots.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Last-known tradability and price for a symbol.
///
/// Immutable once constructed; the quote cache replaces entries on refresh
/// rather than mutating them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Ticker symbol.
    pub symbol: String,
    /// Last trade price.
    pub last_price: Decimal,
    /// Whether the instrument currently accepts orders.
    pub tradable: bool,
    /// Timestamp when this quote was fetched from the brokerage.
    pub fetched_at: DateTime<Utc>,
}

impl Quote {
    /// Create a quote stamped with the current time.
    pub fn new(symbol: impl Into<String>, last_price: Decimal, tradable: bool) -> Self {
        Self {
            symbol: symbol.into(),
            last_price,
            tradable,
            fetched_at: Utc::now(),
        }
    }
}

/// Trading-session status for one exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketHours {
    /// Exchange name (e.g., "NASDAQ").
    pub exchange: String,
    /// Whether the exchange is currently in a trading session.
    pub is_open: bool,
    /// Next session open, when known and currently closed.
    pub next_open: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quote_stamped_on_construction() {
        let before = Utc::now();
        let quote = Quote::new("NVDA", dec!(875.40), true);
        assert!(quote.fetched_at >= before);
        assert!(quote.tradable);
    }
}
