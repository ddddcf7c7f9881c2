//! Property-based tests for balance arithmetic.
//!
//! - Ledger invariant holds after any sequence of payments, edits and
//!   carry-forwards
//! - Rejected operations leave the balance untouched
//! - `compute_fee_summary` is pure and additive

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::balance::{Balance, compute_fee_summary};
use super::types::FeeType;
use crate::testing::line_item;

/// Strategy to generate non-negative amounts (0.00 to 100,000.00).
fn amount() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate signed amounts including zero and negatives.
fn any_amount() -> impl Strategy<Value = Decimal> {
    (-1_000_000i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

#[derive(Debug, Clone)]
enum Op {
    Pay(Decimal),
    Edit(Decimal, Decimal),
    CarryForward,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => any_amount().prop_map(Op::Pay),
        2 => (any_amount(), any_amount()).prop_map(|(t, p)| Op::Edit(t, p)),
        1 => Just(Op::CarryForward),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_invariant_survives_any_sequence(
        total in amount(),
        previous in amount(),
        ops in prop::collection::vec(op(), 0..30),
    ) {
        let mut balance = Balance::unpaid(total, previous);
        let mut paid_sum = Decimal::ZERO;

        for op in ops {
            let before = balance;
            let next = match op {
                Op::Pay(amount) => balance.apply_payment(amount).inspect(|_| paid_sum += amount),
                Op::Edit(t, p) => balance.with_charges(t, p),
                Op::CarryForward => Ok(balance.carry_forward()),
            };
            match next {
                Ok(b) => balance = b,
                Err(_) => prop_assert_eq!(balance, before),
            }
            prop_assert!(balance.is_reconciled());
            prop_assert_eq!(balance.paid_amount, paid_sum);
            prop_assert!(balance.carried_forward_amount >= before.carried_forward_amount);
        }
    }

    #[test]
    fn prop_overpayment_always_rejected(
        total in amount(),
        previous in amount(),
        extra in 1i64..1_000_000i64,
    ) {
        let balance = Balance::unpaid(total, previous);
        let amount = balance.outstanding_amount + Decimal::new(extra, 2);
        prop_assert!(balance.apply_payment(amount).is_err());
    }

    #[test]
    fn prop_summary_is_idempotent_and_additive(
        rows in prop::collection::vec((amount(), amount(), 0u8..=100), 0..12),
    ) {
        let items: Vec<_> = rows
            .into_iter()
            .map(|(total, previous, pct)| {
                let paid = (total + previous) * Decimal::from(pct) / Decimal::ONE_HUNDRED;
                let paid = paid.round_dp(2).min(total + previous);
                line_item(FeeType::Tuition, total, previous, paid)
            })
            .collect();

        let first = compute_fee_summary(&items);
        let second = compute_fee_summary(&items);
        prop_assert_eq!(first, second);

        prop_assert_eq!(
            first.outstanding_amount,
            first.total_amount + first.previous_year_fees
                - first.paid_amount
                - first.carried_forward_amount
        );

        let (left, right) = items.split_at(items.len() / 2);
        let l = compute_fee_summary(left);
        let r = compute_fee_summary(right);
        prop_assert_eq!(first.total_amount, l.total_amount + r.total_amount);
        prop_assert_eq!(first.outstanding_amount, l.outstanding_amount + r.outstanding_amount);
    }
}
