//! Money helpers over `rust_decimal::Decimal`.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Fee amounts are plain `Decimal` values in the school's currency; this module
//! owns the rounding rule applied whenever an amount is derived rather than
//! entered.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places kept on stored amounts.
pub const MONEY_SCALE: u32 = 2;

/// Rounds an amount to `MONEY_SCALE` places using Banker's Rounding.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Applies a percentage increase to `base` and rounds the result.
///
/// `apply_percentage_increase(2000, 10) == 2200`.
#[must_use]
pub fn apply_percentage_increase(base: Decimal, percent: Decimal) -> Decimal {
    round_money(base * (Decimal::ONE + percent / Decimal::ONE_HUNDRED))
}

#[cfg(test)]
#[path = "money_tests.rs"]
mod tests;
