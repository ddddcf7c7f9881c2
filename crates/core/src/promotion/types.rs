use kosh_shared::types::{AcademicSessionId, EnrollmentId, FeeLineItemId, StudentId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enrollment::NewEnrollment;
use crate::ledger::{Balance, NewFeeLineItem};

/// Students to move from one session into another.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PromotionBatch {
    /// Students to promote, in processing order.
    pub student_ids: Vec<StudentId>,
    /// Session the students are leaving.
    pub source_session_id: AcademicSessionId,
    /// Session the students are joining.
    pub target_session_id: AcademicSessionId,
    /// Class in the target session.
    pub target_class: String,
    /// Section in the target session.
    #[serde(default)]
    pub target_section: Option<String>,
    /// Fee increase in percent, `0..=20`.
    #[serde(default)]
    pub fee_increase_percent: Decimal,
}

/// Where a batch is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PromotionPhase {
    /// Not started.
    Idle,
    /// Checking preconditions; nothing written yet.
    Validating,
    /// Writing student `ordinal` (1-based) of `total`.
    Promoting {
        /// Current student.
        ordinal: usize,
        /// Batch size.
        total: usize,
    },
    /// Every student was promoted.
    Completed,
    /// Student `ordinal` (1-based) failed; later students were not attempted.
    Failed {
        /// Failing student.
        ordinal: usize,
    },
}

/// A source-session line item whose dues move into the target session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarriedLineItem {
    /// Source line item.
    pub line_item_id: FeeLineItemId,
    /// Version the closure was computed from.
    pub expected_version: i64,
    /// Closed balance: nothing outstanding, the unpaid part in
    /// `carried_forward_amount`.
    pub balance: Balance,
}

/// Everything written for one student, as a single atomic unit.
///
/// The store must apply all of it or none of it. A carried item that moved
/// past its `expected_version` fails the whole write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionWrite {
    /// Enrollment in the target session.
    pub enrollment: NewEnrollment,
    /// Line items in the target session.
    pub line_items: Vec<NewFeeLineItem>,
    /// Source items closed by this promotion.
    pub carried_items: Vec<CarriedLineItem>,
}

/// A student that made it into the target session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromotedStudent {
    /// Student.
    pub student_id: StudentId,
    /// New enrollment.
    pub enrollment_id: EnrollmentId,
    /// Number of line items created.
    pub line_items: usize,
    /// Dues carried from the source session.
    pub carried_forward: Decimal,
    /// Total outstanding in the target session.
    pub outstanding: Decimal,
}

/// A student that could not be promoted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromotionFailure {
    /// Student.
    pub student_id: StudentId,
    /// Display name.
    pub student_name: String,
    /// Why the write failed.
    pub reason: String,
}

/// Outcome of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromotionReport {
    /// Final phase, `Completed` or `Failed`.
    pub phase: PromotionPhase,
    /// Committed students.
    pub succeeded: Vec<PromotedStudent>,
    /// The student that stopped the batch, if any.
    pub failed: Vec<PromotionFailure>,
    /// Students after the failure, untouched.
    pub not_attempted: Vec<StudentId>,
}

impl PromotionReport {
    /// Returns true if every student was promoted.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == PromotionPhase::Completed
    }
}
