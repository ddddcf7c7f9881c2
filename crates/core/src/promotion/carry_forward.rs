//! Line items a promoted student starts the new session with.
//!
//! Each fee of the source session is re-charged with the fee increase
//! applied, and whatever is still unpaid on it becomes the new item's
//! `previous_year_fees`. Because `outstanding` already contains older
//! carried dues, every unpaid rupee is carried exactly once; there is no
//! interest. The source item is closed in the same write, its unpaid part
//! moved into `carried_forward_amount`, so the dues are owed in one place.

use kosh_shared::types::{AcademicSessionId, StudentId, apply_percentage_increase};
use rust_decimal::Decimal;

use crate::enrollment::ClassFeeStructure;
use super::types::CarriedLineItem;
use crate::ledger::{Balance, FeeLineItem, FeeType, LedgerError, NewFeeLineItem};

/// Largest fee increase a promotion may apply, in percent.
pub const MAX_FEE_INCREASE_PERCENT: Decimal = Decimal::from_parts(20, 0, 0, false, 0);

/// Checks that `percent` lies in `[0, MAX_FEE_INCREASE_PERCENT]`.
///
/// # Errors
///
/// `InvalidFeeIncrease` otherwise.
pub fn check_fee_increase(percent: Decimal) -> Result<(), LedgerError> {
    if percent < Decimal::ZERO || percent > MAX_FEE_INCREASE_PERCENT {
        return Err(LedgerError::InvalidFeeIncrease(percent));
    }
    Ok(())
}

/// Plans the target-session items from the source-session items.
///
/// `previous_year` items are not re-charged: their unpaid amount moves over
/// as carried dues with a zero current charge, and a settled one is dropped.
#[must_use]
pub fn plan_line_items(
    source: &[FeeLineItem],
    student_id: StudentId,
    target_session_id: AcademicSessionId,
    fee_increase_percent: Decimal,
) -> Vec<NewFeeLineItem> {
    source
        .iter()
        .filter_map(|item| {
            let balance = if item.fee_type == FeeType::PreviousYear {
                if item.balance().is_settled() {
                    return None;
                }
                Balance::unpaid(Decimal::ZERO, item.outstanding_amount)
            } else {
                Balance::unpaid(
                    apply_percentage_increase(item.total_amount, fee_increase_percent),
                    item.outstanding_amount,
                )
            };
            Some(NewFeeLineItem {
                student_id,
                session_id: target_session_id,
                fee_type: item.fee_type,
                balance,
            })
        })
        .collect()
}

/// Closures for every source item that still owes something.
#[must_use]
pub fn close_line_items(source: &[FeeLineItem]) -> Vec<CarriedLineItem> {
    source
        .iter()
        .filter(|item| !item.balance().is_settled())
        .map(|item| CarriedLineItem {
            line_item_id: item.id,
            expected_version: item.version,
            balance: item.balance().carry_forward(),
        })
        .collect()
}

/// Items for a student with nothing billed in the source session: the
/// target class's yearly tuition with the increase applied, or nothing when
/// the class has no active fee structure.
#[must_use]
pub fn fallback_line_items(
    structure: Option<&ClassFeeStructure>,
    student_id: StudentId,
    target_session_id: AcademicSessionId,
    fee_increase_percent: Decimal,
) -> Vec<NewFeeLineItem> {
    structure
        .filter(|s| s.is_active && s.tuition_fee_yearly > Decimal::ZERO)
        .map(|s| NewFeeLineItem {
            student_id,
            session_id: target_session_id,
            fee_type: FeeType::Tuition,
            balance: Balance::unpaid(
                apply_percentage_increase(s.tuition_fee_yearly, fee_increase_percent),
                Decimal::ZERO,
            ),
        })
        .into_iter()
        .collect()
}
