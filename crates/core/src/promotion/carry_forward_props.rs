//! Property-based tests for dues carry-forward.
//!
//! - Every planned item satisfies the ledger invariant with nothing paid
//! - Unpaid amounts are carried exactly once: what the new items owe as
//!   previous dues is exactly what the closed source items stop owing
//! - New charges never shrink and never exceed the increase cap

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::carry_forward::{MAX_FEE_INCREASE_PERCENT, close_line_items, plan_line_items};
use crate::ledger::FeeType;
use crate::testing::line_item;
use kosh_shared::types::{AcademicSessionId, StudentId, round_money};

fn amount() -> impl Strategy<Value = Decimal> {
    (0i64..5_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Fee increase percent in 0.00..=20.00.
fn percent() -> impl Strategy<Value = Decimal> {
    (0i64..=2_000i64).prop_map(|bp| Decimal::new(bp, 2))
}

fn fee_type() -> impl Strategy<Value = FeeType> {
    prop::sample::select(FeeType::ALL.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_planned_items_are_reconciled_and_unpaid(
        rows in prop::collection::vec((fee_type(), amount(), amount(), 0u8..=100), 0..8),
        pct in percent(),
    ) {
        let student = StudentId::new();
        let source: Vec<_> = rows
            .into_iter()
            .map(|(fee_type, total, previous, share)| {
                let owed = total + previous;
                let paid = round_money(owed * Decimal::from(share) / Decimal::ONE_HUNDRED)
                    .min(owed);
                let mut item = line_item(fee_type, total, previous, paid);
                item.student_id = student;
                item
            })
            .collect();

        let planned = plan_line_items(&source, student, AcademicSessionId::new(), pct);

        for item in &planned {
            prop_assert!(item.balance.is_reconciled());
            prop_assert_eq!(item.balance.paid_amount, Decimal::ZERO);
            prop_assert_eq!(item.student_id, student);
        }

        let carried: Decimal = planned.iter().map(|i| i.balance.previous_year_fees).sum();
        let unpaid: Decimal = source.iter().map(|i| i.outstanding_amount).sum();
        prop_assert_eq!(carried, unpaid);

        let closed = close_line_items(&source);
        for closure in &closed {
            prop_assert!(closure.balance.is_reconciled());
            prop_assert!(closure.balance.is_settled());
        }
        let closed_out: Decimal = closed.iter().map(|c| c.balance.carried_forward_amount).sum();
        prop_assert_eq!(closed_out, carried);
    }

    #[test]
    fn prop_new_charge_within_increase_cap(total in amount(), pct in percent()) {
        let source = line_item(FeeType::Tuition, total, Decimal::ZERO, Decimal::ZERO);
        let target = AcademicSessionId::new();
        let planned = plan_line_items(&[source.clone()], source.student_id, target, pct);

        let new_total = planned[0].balance.total_amount;
        let factor = Decimal::ONE + MAX_FEE_INCREASE_PERCENT / Decimal::ONE_HUNDRED;
        let cap = round_money(total * factor);
        prop_assert!(new_total >= total);
        prop_assert!(new_total <= cap);
        prop_assert_eq!(new_total.scale().min(2), new_total.scale());
    }
}
