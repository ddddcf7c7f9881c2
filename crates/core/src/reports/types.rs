//! Report types.

use chrono::NaiveDate;
use kosh_shared::types::{AcademicSessionId, StudentId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::expenses::ExpenseCategory;
use crate::ledger::{FeeSummary, FeeType, PaymentMethod};

/// Narrows the defaulters list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DefaulterFilter {
    /// Only students enrolled in this class.
    #[serde(default)]
    pub class_grade: Option<String>,
    /// Case-insensitive match on name, scholar number or phone.
    #[serde(default)]
    pub search: Option<String>,
}

/// One student who still owes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefaulterRow {
    /// Student.
    pub student_id: StudentId,
    /// Scholar number.
    pub scholar_no: String,
    /// Full name.
    pub student_name: String,
    /// Parent phone.
    pub parent_phone: String,
    /// Class, if enrolled in the session.
    pub class_grade: Option<String>,
    /// Fee types with something outstanding.
    pub fee_types: Vec<FeeType>,
    /// Totals over the unpaid line items.
    #[serde(flatten)]
    pub summary: FeeSummary,
}

/// Defaulters, largest outstanding first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefaultersReport {
    /// Session the report covers; `None` means all sessions.
    pub session_id: Option<AcademicSessionId>,
    /// One row per student.
    pub rows: Vec<DefaulterRow>,
    /// Sum of outstanding over `rows`.
    pub total_outstanding: Decimal,
}

/// Amount and count for one payment method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodTotal {
    /// Payment method.
    pub method: PaymentMethod,
    /// Amount received.
    pub amount: Decimal,
    /// Number of payments.
    pub count: usize,
}

/// Amount and count for one fee type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeeTypeTotal {
    /// Fee type.
    pub fee_type: FeeType,
    /// Amount received.
    pub amount: Decimal,
    /// Number of payments.
    pub count: usize,
}

/// Payments received over a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionSummary {
    /// Total received.
    pub total_collected: Decimal,
    /// Number of payments.
    pub transaction_count: usize,
    /// Per method, in `PaymentMethod::ALL` order, empty methods omitted.
    pub by_method: Vec<MethodTotal>,
    /// Per fee type, in `FeeType::ALL` order, empty types omitted.
    pub by_fee_type: Vec<FeeTypeTotal>,
}

/// Summary of one fee type in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeeTypeOverview {
    /// Fee type.
    pub fee_type: FeeType,
    /// Line items of this type.
    pub line_items: usize,
    /// Totals.
    #[serde(flatten)]
    pub summary: FeeSummary,
}

/// Billing state of a whole session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionFeeOverview {
    /// Session.
    pub session_id: AcademicSessionId,
    /// Students with at least one line item.
    pub students_billed: usize,
    /// Students with nothing outstanding.
    pub students_settled: usize,
    /// Totals over every line item.
    pub summary: FeeSummary,
    /// Per fee type, in `FeeType::ALL` order, empty types omitted.
    pub by_fee_type: Vec<FeeTypeOverview>,
}

/// Inclusive range of days for the financial overview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FinancialPeriod {
    /// First day.
    pub from: NaiveDate,
    /// Last day.
    pub to: NaiveDate,
}

/// Amount and count for one expense category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryTotal {
    /// Category.
    pub category: ExpenseCategory,
    /// Amount spent.
    pub amount: Decimal,
    /// Number of expenses.
    pub count: usize,
}

/// Money in against money out over a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinancialOverview {
    /// First day covered.
    pub from: NaiveDate,
    /// Last day covered.
    pub to: NaiveDate,
    /// Fee payments received.
    pub fees_collected: Decimal,
    /// Number of fee payments.
    pub payment_count: usize,
    /// Money paid out.
    pub total_expenses: Decimal,
    /// Number of expenses.
    pub expense_count: usize,
    /// `fees_collected - total_expenses`; negative when spending ran ahead.
    pub net_balance: Decimal,
    /// Per category, in `ExpenseCategory::ALL` order, empty categories omitted.
    pub expenses_by_category: Vec<CategoryTotal>,
}
