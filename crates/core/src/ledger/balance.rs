//! Balance arithmetic for fee line items.
//!
//! Pure functions only; nothing here touches the store.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::LedgerError;
use super::types::{FeeBreakdownRow, FeeLineItem, FeeSummary, FeeType};

/// The money fields of a line item.
///
/// Every constructor and transition keeps `outstanding_amount >= 0` and
///
/// ```text
/// outstanding = total + previous_year_fees - paid - carried_forward
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Current-year charge.
    pub total_amount: Decimal,
    /// Dues carried over from earlier sessions.
    pub previous_year_fees: Decimal,
    /// Payments received.
    pub paid_amount: Decimal,
    /// Unpaid dues moved into a later session's line item.
    #[serde(default)]
    pub carried_forward_amount: Decimal,
    /// What is still owed.
    pub outstanding_amount: Decimal,
}

impl Balance {
    /// Opening balance of a freshly assigned fee: nothing paid yet.
    ///
    /// # Errors
    ///
    /// `Validation` if `total_amount <= 0` or `previous_year_fees < 0`.
    pub fn assigned(
        total_amount: Decimal,
        previous_year_fees: Decimal,
    ) -> Result<Self, LedgerError> {
        if total_amount <= Decimal::ZERO {
            return Err(LedgerError::Validation(
                "Total amount must be greater than zero".to_string(),
            ));
        }
        if previous_year_fees < Decimal::ZERO {
            return Err(LedgerError::Validation(
                "Previous year fees cannot be negative".to_string(),
            ));
        }
        Ok(Self::unpaid(total_amount, previous_year_fees))
    }

    /// Balance with nothing paid. Callers guarantee non-negative inputs.
    #[must_use]
    pub fn unpaid(total_amount: Decimal, previous_year_fees: Decimal) -> Self {
        Self {
            total_amount,
            previous_year_fees,
            paid_amount: Decimal::ZERO,
            carried_forward_amount: Decimal::ZERO,
            outstanding_amount: total_amount + previous_year_fees,
        }
    }

    /// Applies a payment.
    ///
    /// # Errors
    ///
    /// `InvalidPaymentAmount` if `amount <= 0` or `amount > outstanding_amount`.
    pub fn apply_payment(&self, amount: Decimal) -> Result<Self, LedgerError> {
        if amount <= Decimal::ZERO || amount > self.outstanding_amount {
            return Err(LedgerError::InvalidPaymentAmount {
                amount,
                outstanding: self.outstanding_amount,
            });
        }
        Ok(Self {
            paid_amount: self.paid_amount + amount,
            outstanding_amount: self.outstanding_amount - amount,
            ..*self
        })
    }

    /// Replaces the charges, keeping what has been paid.
    ///
    /// # Errors
    ///
    /// `Validation` on negative charges or when the new charges fall below
    /// what has already been paid.
    pub fn with_charges(
        &self,
        total_amount: Decimal,
        previous_year_fees: Decimal,
    ) -> Result<Self, LedgerError> {
        if total_amount < Decimal::ZERO || previous_year_fees < Decimal::ZERO {
            return Err(LedgerError::Validation(
                "Fee amounts cannot be negative".to_string(),
            ));
        }
        let settled = self.paid_amount + self.carried_forward_amount;
        let outstanding_amount = total_amount + previous_year_fees - settled;
        if outstanding_amount < Decimal::ZERO {
            return Err(LedgerError::Validation(format!(
                "New charges {} are below the {} already paid or carried forward",
                total_amount + previous_year_fees,
                settled
            )));
        }
        Ok(Self {
            total_amount,
            previous_year_fees,
            outstanding_amount,
            ..*self
        })
    }

    /// Closes the item out by moving everything still owed into
    /// `carried_forward_amount`. The result owes nothing.
    #[must_use]
    pub fn carry_forward(&self) -> Self {
        Self {
            carried_forward_amount: self.carried_forward_amount + self.outstanding_amount,
            outstanding_amount: Decimal::ZERO,
            ..*self
        }
    }

    /// Returns true if the ledger invariant holds.
    #[must_use]
    pub fn is_reconciled(&self) -> bool {
        self.outstanding_amount >= Decimal::ZERO
            && self.carried_forward_amount >= Decimal::ZERO
            && self.outstanding_amount
                == self.total_amount + self.previous_year_fees
                    - self.paid_amount
                    - self.carried_forward_amount
    }

    /// Returns true if nothing is owed.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.outstanding_amount <= Decimal::ZERO
    }
}

/// Sums every money field over `items`.
///
/// Dues that were carried into a later session count once: in the later
/// item's `outstanding_amount`, never in the closed source item.
#[must_use]
pub fn compute_fee_summary(items: &[FeeLineItem]) -> FeeSummary {
    items.iter().fold(FeeSummary::default(), |acc, item| FeeSummary {
        total_amount: acc.total_amount + item.total_amount,
        previous_year_fees: acc.previous_year_fees + item.previous_year_fees,
        paid_amount: acc.paid_amount + item.paid_amount,
        carried_forward_amount: acc.carried_forward_amount + item.carried_forward_amount,
        outstanding_amount: acc.outstanding_amount + item.outstanding_amount,
    })
}

/// Builds a breakdown where every canonical fee type appears.
///
/// Canonical types come first in `canonical` order; a missing one becomes a
/// zero row without a line item. Types outside `canonical` are appended in
/// the order they appear in `items`.
#[must_use]
pub fn with_canonical_fee_types(
    items: &[FeeLineItem],
    canonical: &[FeeType],
) -> Vec<FeeBreakdownRow> {
    let mut rows = Vec::with_capacity(canonical.len() + items.len());

    for &fee_type in canonical {
        let mut found = false;
        for item in items.iter().filter(|i| i.fee_type == fee_type) {
            rows.push(row_for(item));
            found = true;
        }
        if !found {
            rows.push(FeeBreakdownRow {
                line_item_id: None,
                fee_type,
                label: fee_type.label(),
                balance: Balance::default(),
            });
        }
    }

    rows.extend(
        items
            .iter()
            .filter(|i| !canonical.contains(&i.fee_type))
            .map(row_for),
    );
    rows
}

fn row_for(item: &FeeLineItem) -> FeeBreakdownRow {
    FeeBreakdownRow {
        line_item_id: Some(item.id),
        fee_type: item.fee_type,
        label: item.fee_type.label(),
        balance: item.balance(),
    }
}
