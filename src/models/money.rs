//! Fixed-point helpers for cash amounts and per-share costs.
//!
//! Every amount that reaches the ledger is truncated toward zero, never
//! rounded. Cash carries two decimal places, average costs carry four.

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places kept for cash amounts and balances.
pub const CASH_DP: u32 = 2;

/// Decimal places kept for a position's average cost.
pub const COST_DP: u32 = 4;

/// Truncate to `dp` places and pin the scale so the value always prints with
/// exactly `dp` digits.
pub fn truncate(value: Decimal, dp: u32) -> Decimal {
    let mut truncated = value.round_dp_with_strategy(dp, RoundingStrategy::ToZero);
    truncated.rescale(dp);
    truncated
}

/// Truncate a cash amount to whole cents.
pub fn cents(value: Decimal) -> Decimal {
    truncate(value, CASH_DP)
}

/// Value of `quantity` shares at `price`, truncated to cents. Saturates at
/// `Decimal::MAX` for reporting.
pub fn trade_value(quantity: i64, price: Decimal) -> Decimal {
    cents(Decimal::from(quantity).saturating_mul(price))
}

/// Like [`trade_value`], but `None` instead of overflowing.
pub fn checked_trade_value(quantity: i64, price: Decimal) -> Option<Decimal> {
    Decimal::from(quantity).checked_mul(price).map(cents)
}

/// Weighted average of an existing holding and a new lot, truncated to four
/// decimal places. `None` when the totals do not fit.
pub fn weighted_average(
    prev_quantity: i64,
    prev_average: Decimal,
    quantity: i64,
    price: Decimal,
) -> Option<Decimal> {
    let total_quantity = Decimal::from(prev_quantity.checked_add(quantity)?);
    if total_quantity.is_zero() {
        return Some(truncate(price, COST_DP));
    }
    let held_cost = Decimal::from(prev_quantity).checked_mul(prev_average)?;
    let lot_cost = Decimal::from(quantity).checked_mul(price)?;
    let total_cost = held_cost.checked_add(lot_cost)?;
    Some(truncate(total_cost.checked_div(total_quantity)?, COST_DP))
}
