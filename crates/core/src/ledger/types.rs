//! Ledger domain types.
//!
//! Rows as they come out of the store ([`FeeLineItem`], [`FeeTransaction`]),
//! inputs accepted by the service, and the write payloads handed back to the
//! store ([`NewFeeLineItem`], [`FeeLineItemPatch`], [`PaymentCommit`]).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use kosh_shared::types::{AcademicSessionId, FeeLineItemId, FeeTransactionId, StudentId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::balance::Balance;
use super::error::LedgerError;

/// Kind of charge a line item represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeType {
    /// Yearly tuition.
    Tuition,
    /// One-time admission fee.
    Admission,
    /// School bus.
    Transport,
    /// Sports.
    Sports,
    /// Library.
    Library,
    /// Examination.
    Examination,
    /// Annual charges.
    Annual,
    /// Miscellaneous.
    Miscellaneous,
    /// Anything else.
    Other,
    /// Dues carried over from an earlier session.
    PreviousYear,
}

/// Fee types that always appear in a student's breakdown, in display order.
pub const CANONICAL_FEE_TYPES: [FeeType; 5] = [
    FeeType::Tuition,
    FeeType::Transport,
    FeeType::Admission,
    FeeType::Other,
    FeeType::PreviousYear,
];

impl FeeType {
    /// Every fee type.
    pub const ALL: [Self; 10] = [
        Self::Tuition,
        Self::Admission,
        Self::Transport,
        Self::Sports,
        Self::Library,
        Self::Examination,
        Self::Annual,
        Self::Miscellaneous,
        Self::Other,
        Self::PreviousYear,
    ];

    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tuition => "tuition",
            Self::Admission => "admission",
            Self::Transport => "transport",
            Self::Sports => "sports",
            Self::Library => "library",
            Self::Examination => "examination",
            Self::Annual => "annual",
            Self::Miscellaneous => "miscellaneous",
            Self::Other => "other",
            Self::PreviousYear => "previous_year",
        }
    }

    /// Human readable label used on receipts and reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Tuition => "Tuition Fee",
            Self::Admission => "Admission Fee",
            Self::Transport => "Transport Fee",
            Self::Sports => "Sports Fee",
            Self::Library => "Library Fee",
            Self::Examination => "Examination Fee",
            Self::Annual => "Annual Charges",
            Self::Miscellaneous => "Miscellaneous",
            Self::Other => "Other Fee",
            Self::PreviousYear => "Previous Year Dues",
        }
    }
}

impl fmt::Display for FeeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeeType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| LedgerError::Validation(format!("Unknown fee type: {s}")))
    }
}

/// How a payment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash at the counter.
    Cash,
    /// UPI transfer.
    Upi,
    /// Bank transfer / NEFT.
    BankTransfer,
    /// Cheque.
    Cheque,
    /// Debit or credit card.
    Card,
}

impl PaymentMethod {
    /// Every payment method.
    pub const ALL: [Self; 5] = [
        Self::Cash,
        Self::Upi,
        Self::BankTransfer,
        Self::Cheque,
        Self::Card,
    ];

    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Upi => "upi",
            Self::BankTransfer => "bank_transfer",
            Self::Cheque => "cheque",
            Self::Card => "card",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| LedgerError::Validation(format!("Unknown payment method: {s}")))
    }
}

/// One (student, fee type, session) balance record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeLineItem {
    /// Line item ID.
    pub id: FeeLineItemId,
    /// Student billed.
    pub student_id: StudentId,
    /// Session the charge belongs to.
    pub session_id: AcademicSessionId,
    /// Kind of charge.
    pub fee_type: FeeType,
    /// Current-year charge.
    pub total_amount: Decimal,
    /// Dues carried over from earlier sessions.
    pub previous_year_fees: Decimal,
    /// Sum of payments recorded against this item.
    pub paid_amount: Decimal,
    /// Unpaid dues moved into the next session by a promotion.
    pub carried_forward_amount: Decimal,
    /// `total_amount + previous_year_fees - paid_amount - carried_forward_amount`.
    pub outstanding_amount: Decimal,
    /// Optimistic concurrency counter, bumped on every write.
    pub version: i64,
    /// When the item was created.
    pub created_at: DateTime<Utc>,
    /// When the item was last written.
    pub updated_at: DateTime<Utc>,
}

impl FeeLineItem {
    /// The balance fields of this item.
    #[must_use]
    pub const fn balance(&self) -> Balance {
        Balance {
            total_amount: self.total_amount,
            previous_year_fees: self.previous_year_fees,
            paid_amount: self.paid_amount,
            carried_forward_amount: self.carried_forward_amount,
            outstanding_amount: self.outstanding_amount,
        }
    }

    /// Returns true once a promotion has moved this item's dues into a later
    /// session. Such an item is read-only.
    #[must_use]
    pub fn is_carried_forward(&self) -> bool {
        self.carried_forward_amount > Decimal::ZERO
    }
}

/// Line item to insert. The store assigns id, version and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFeeLineItem {
    /// Student billed.
    pub student_id: StudentId,
    /// Session the charge belongs to.
    pub session_id: AcademicSessionId,
    /// Kind of charge.
    pub fee_type: FeeType,
    /// Opening balance.
    pub balance: Balance,
}

/// Compare-and-swap update of a line item's charges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeLineItemPatch {
    /// Version the caller read; the update is a no-op if it moved.
    pub expected_version: i64,
    /// New balance. `paid_amount` must equal the stored value.
    pub balance: Balance,
}

/// Request to charge a student a fee for a session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeeAssignment {
    /// Student to bill.
    pub student_id: StudentId,
    /// Session the charge belongs to.
    pub session_id: AcademicSessionId,
    /// Kind of charge.
    pub fee_type: FeeType,
    /// Current-year charge, must be positive.
    pub total_amount: Decimal,
    /// Dues carried over, must not be negative.
    #[serde(default)]
    pub previous_year_fees: Decimal,
}

/// New charges for an existing line item. Paid amount is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FeeEdit {
    /// New current-year charge.
    pub total_amount: Decimal,
    /// New carried-over dues.
    pub previous_year_fees: Decimal,
}

/// A payment against one line item.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentInput {
    /// Line item being paid.
    pub line_item_id: FeeLineItemId,
    /// Amount received.
    pub amount: Decimal,
    /// How it was paid.
    pub method: PaymentMethod,
    /// Cheque number, UPI reference and so on.
    #[serde(default)]
    pub reference: Option<String>,
    /// Free-form note.
    #[serde(default)]
    pub remarks: Option<String>,
}

/// Payment transaction to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFeeTransaction {
    /// Student who paid.
    pub student_id: StudentId,
    /// Session of the line item.
    pub session_id: AcademicSessionId,
    /// Line item credited.
    pub line_item_id: FeeLineItemId,
    /// Fee type of the line item.
    pub fee_type: FeeType,
    /// Amount received.
    pub amount: Decimal,
    /// How it was paid.
    pub method: PaymentMethod,
    /// External reference.
    pub reference: Option<String>,
    /// Free-form note.
    pub remarks: Option<String>,
    /// Who recorded the payment.
    pub recorded_by: String,
}

/// Append-only payment record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTransaction {
    /// Transaction ID.
    pub id: FeeTransactionId,
    /// Student who paid.
    pub student_id: StudentId,
    /// Session of the line item.
    pub session_id: AcademicSessionId,
    /// Line item credited.
    pub line_item_id: FeeLineItemId,
    /// Fee type of the line item.
    pub fee_type: FeeType,
    /// Amount received.
    pub amount: Decimal,
    /// How it was paid.
    pub method: PaymentMethod,
    /// External reference.
    pub reference: Option<String>,
    /// Free-form note.
    pub remarks: Option<String>,
    /// Who recorded the payment.
    pub recorded_by: String,
    /// When the payment was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl FeeTransaction {
    /// Number printed on the receipt slip, e.g. `RCP-9F3A61C2`.
    ///
    /// Taken from the random tail of the id; the head of a v7 id is a
    /// timestamp and repeats for payments recorded close together.
    #[must_use]
    pub fn receipt_no(&self) -> String {
        let hex = self.id.into_inner().simple().to_string();
        format!("RCP-{}", hex[hex.len() - 8..].to_uppercase())
    }
}

/// Balance update and transaction insert applied as one unit.
///
/// The store must only apply it while the row is still at
/// `expected_version` and its outstanding amount still covers
/// `transaction.amount`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentCommit {
    /// Line item being paid.
    pub line_item_id: FeeLineItemId,
    /// Version the balance was computed from.
    pub expected_version: i64,
    /// Balance after the payment.
    pub balance: Balance,
    /// Transaction to append.
    pub transaction: NewFeeTransaction,
}

/// Result of a committed payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentReceipt {
    /// Receipt number of the transaction.
    pub receipt_no: String,
    /// Line item after the payment.
    pub line_item: FeeLineItem,
    /// The appended transaction.
    pub transaction: FeeTransaction,
}

impl PaymentReceipt {
    /// Receipt for a committed transaction.
    #[must_use]
    pub fn new(line_item: FeeLineItem, transaction: FeeTransaction) -> Self {
        Self {
            receipt_no: transaction.receipt_no(),
            line_item,
            transaction,
        }
    }
}

/// Aggregate over a set of line items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeeSummary {
    /// Sum of current-year charges.
    pub total_amount: Decimal,
    /// Sum of carried-over dues.
    pub previous_year_fees: Decimal,
    /// Sum of payments.
    pub paid_amount: Decimal,
    /// Sum of dues moved into later sessions.
    pub carried_forward_amount: Decimal,
    /// Sum of outstanding amounts.
    pub outstanding_amount: Decimal,
}

/// One row of a student's fee breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeeBreakdownRow {
    /// Backing line item; `None` for a padded canonical row.
    pub line_item_id: Option<FeeLineItemId>,
    /// Fee type.
    pub fee_type: FeeType,
    /// Display label.
    pub label: &'static str,
    /// Balance of the row.
    #[serde(flatten)]
    pub balance: Balance,
}

/// Filter for payment history queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TransactionFilter {
    /// Only this student.
    pub student_id: Option<StudentId>,
    /// Only this session.
    pub session_id: Option<AcademicSessionId>,
    /// Only this line item.
    pub line_item_id: Option<FeeLineItemId>,
    /// Only this payment method.
    pub method: Option<PaymentMethod>,
    /// Recorded at or after.
    pub from: Option<DateTime<Utc>>,
    /// Recorded before.
    pub to: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    /// Returns true if the transaction passes every set criterion.
    #[must_use]
    pub fn matches(&self, tx: &FeeTransaction) -> bool {
        self.student_id.is_none_or(|id| id == tx.student_id)
            && self.session_id.is_none_or(|id| id == tx.session_id)
            && self.line_item_id.is_none_or(|id| id == tx.line_item_id)
            && self.method.is_none_or(|m| m == tx.method)
            && self.from.is_none_or(|from| tx.recorded_at >= from)
            && self.to.is_none_or(|to| tx.recorded_at < to)
    }
}

/// An unpaid line item joined with the student it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutstandingLineItem {
    /// The line item.
    pub line_item: FeeLineItem,
    /// Scholar number of the student.
    pub scholar_no: String,
    /// Full name of the student.
    pub student_name: String,
    /// Parent phone for follow-up.
    pub parent_phone: String,
    /// Class in the line item's session, if enrolled.
    pub class_grade: Option<String>,
}

/// Everything the counter needs to show a student's account for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentLedger {
    /// Student.
    pub student_id: StudentId,
    /// Session shown.
    pub session_id: AcademicSessionId,
    /// Raw line items.
    pub line_items: Vec<FeeLineItem>,
    /// Canonical breakdown, padded with zero rows.
    pub breakdown: Vec<FeeBreakdownRow>,
    /// Totals over the line items.
    pub summary: FeeSummary,
    /// Payment history, newest first.
    pub transactions: Vec<FeeTransaction>,
}
