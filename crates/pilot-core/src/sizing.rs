//! Share quantity sizing.
//!
//! Converts a notional dollar amount into a fractional share quantity at
//! the precision the brokerage supports.

use rust_decimal::Decimal;

/// Decimal places of fractional-share support at the brokerage.
pub const SHARE_PRECISION: u32 = 4;

/// Compute the share quantity for a notional amount at a given price.
///
/// Rounds to [`SHARE_PRECISION`] decimal places. Returns zero when the
/// price is not positive or the amount is too small to reach one unit at
/// that precision; callers must reject non-positive results.
pub fn round_shares(notional: Decimal, last_price: Decimal) -> Decimal {
    if last_price <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (notional / last_price).round_dp(SHARE_PRECISION)
}
