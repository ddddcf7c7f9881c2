//! Promotion coordinator.

use std::collections::HashSet;

use kosh_shared::types::{AcademicSessionId, StudentId};
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use super::carry_forward::{
    check_fee_increase, close_line_items, fallback_line_items, plan_line_items,
};
use super::types::{
    PromotedStudent, PromotionBatch, PromotionFailure, PromotionPhase, PromotionReport,
    PromotionWrite,
};
use crate::audit::{self, ActivityAction, ActivitySink, NewActivityLog};
use crate::enrollment::{NewEnrollment, Student, is_known_class};
use crate::ledger::LedgerError;
use crate::store::{self, EnrollmentStore, FeeStore, SessionStore, StorePolicy};

const MODULE: &str = "promotions";

/// Runs promotion batches.
pub struct PromotionCoordinator<F, E, S, A> {
    fees: F,
    enrollments: E,
    sessions: S,
    audit: A,
    policy: StorePolicy,
}

impl<F, E, S, A> PromotionCoordinator<F, E, S, A>
where
    F: FeeStore,
    E: EnrollmentStore,
    S: SessionStore,
    A: ActivitySink,
{
    /// Creates a coordinator over the given store handles.
    pub const fn new(
        fees: F,
        enrollments: E,
        sessions: S,
        audit: A,
        policy: StorePolicy,
    ) -> Self {
        Self {
            fees,
            enrollments,
            sessions,
            audit,
            policy,
        }
    }

    /// Promotes every student of `batch` into the target session.
    ///
    /// Precondition failures are returned as errors and write nothing. Once
    /// writing starts, the first student that fails stops the batch; students
    /// already written stay written and the report says who is where.
    ///
    /// # Errors
    ///
    /// - `InvalidFeeIncrease` outside `[0, 20]`
    /// - `Validation` for an empty or repeated student list, unknown class,
    ///   identical sessions, or a student not enrolled in the source session
    /// - `SessionNotFound` / `StudentNotFound` for unknown ids
    /// - `DuplicateEnrollment` naming every student already in the target session
    #[instrument(skip_all, fields(
        source = %batch.source_session_id,
        target = %batch.target_session_id,
        students = batch.student_ids.len()
    ))]
    pub async fn promote(
        &self,
        batch: PromotionBatch,
        actor: &str,
    ) -> Result<PromotionReport, LedgerError> {
        debug!(phase = ?PromotionPhase::Validating, "Checking preconditions");
        let students = self.validate(&batch).await?;

        let total = students.len();
        let mut report = PromotionReport {
            phase: PromotionPhase::Idle,
            succeeded: Vec::with_capacity(total),
            failed: Vec::new(),
            not_attempted: Vec::new(),
        };

        for (index, student) in students.iter().enumerate() {
            let ordinal = index + 1;
            report.phase = PromotionPhase::Promoting { ordinal, total };
            debug!(phase = ?report.phase, student_id = %student.id, "Promoting student");

            match self.promote_one(&batch, student).await {
                Ok(promoted) => report.succeeded.push(promoted),
                Err(err) => {
                    warn!(student_id = %student.id, ordinal, error = %err, "Promotion stopped");
                    report.phase = PromotionPhase::Failed { ordinal };
                    report.failed.push(PromotionFailure {
                        student_id: student.id,
                        student_name: student.full_name(),
                        reason: err.to_string(),
                    });
                    report.not_attempted = students[ordinal..].iter().map(|s| s.id).collect();
                    break;
                }
            }
        }

        if report.failed.is_empty() {
            report.phase = PromotionPhase::Completed;
        }

        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            not_attempted = report.not_attempted.len(),
            "Promotion finished"
        );
        self.log(
            actor,
            format!(
                "Promoted {} of {} students to {} ({}% fee increase)",
                report.succeeded.len(),
                total,
                batch.target_class,
                batch.fee_increase_percent
            ),
        )
        .await;

        Ok(report)
    }

    /// Checks every precondition and returns the students in batch order.
    async fn validate(&self, batch: &PromotionBatch) -> Result<Vec<Student>, LedgerError> {
        check_fee_increase(batch.fee_increase_percent)?;

        if batch.student_ids.is_empty() {
            return Err(LedgerError::Validation(
                "Select at least one student to promote".to_string(),
            ));
        }
        let mut seen = HashSet::with_capacity(batch.student_ids.len());
        if let Some(repeated) = batch.student_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(LedgerError::Validation(format!(
                "Student {repeated} appears more than once in the batch"
            )));
        }
        if !is_known_class(&batch.target_class) {
            return Err(LedgerError::Validation(format!(
                "Unknown class grade: {}",
                batch.target_class
            )));
        }
        if batch.source_session_id == batch.target_session_id {
            return Err(LedgerError::Validation(
                "Source and target session must differ".to_string(),
            ));
        }
        self.require_session(batch.source_session_id).await?;
        self.require_session(batch.target_session_id).await?;

        let mut students = Vec::with_capacity(batch.student_ids.len());
        for &student_id in &batch.student_ids {
            let student = store::read(&self.policy, "fetch_student", || {
                self.enrollments.fetch_student(student_id)
            })
            .await?
            .ok_or(LedgerError::StudentNotFound(student_id))?;

            if !self
                .enrollment_exists(student_id, batch.source_session_id)
                .await?
            {
                return Err(LedgerError::Validation(format!(
                    "{} is not enrolled in the source session",
                    student.full_name()
                )));
            }
            students.push(student);
        }

        let mut duplicates = Vec::new();
        for student in &students {
            if self
                .enrollment_exists(student.id, batch.target_session_id)
                .await?
            {
                duplicates.push(student.full_name());
            }
        }
        if !duplicates.is_empty() {
            return Err(LedgerError::DuplicateEnrollment {
                students: duplicates,
            });
        }

        Ok(students)
    }

    async fn promote_one(
        &self,
        batch: &PromotionBatch,
        student: &Student,
    ) -> Result<PromotedStudent, LedgerError> {
        // Re-checked: another batch may have enrolled the student since validation.
        if self
            .enrollment_exists(student.id, batch.target_session_id)
            .await?
        {
            return Err(LedgerError::DuplicateEnrollment {
                students: vec![student.full_name()],
            });
        }

        let source = store::read(&self.policy, "fetch_fee_line_items", || {
            self.fees
                .fetch_fee_line_items(student.id, Some(batch.source_session_id))
        })
        .await?;

        let line_items = if source.is_empty() {
            let structure = store::read(&self.policy, "fetch_class_fee_structure", || {
                self.enrollments
                    .fetch_class_fee_structure(&batch.target_class)
            })
            .await?;
            fallback_line_items(
                structure.as_ref(),
                student.id,
                batch.target_session_id,
                batch.fee_increase_percent,
            )
        } else {
            plan_line_items(
                &source,
                student.id,
                batch.target_session_id,
                batch.fee_increase_percent,
            )
        };

        let carried_forward = line_items
            .iter()
            .map(|i| i.balance.previous_year_fees)
            .sum::<Decimal>();
        let outstanding = line_items
            .iter()
            .map(|i| i.balance.outstanding_amount)
            .sum::<Decimal>();
        let count = line_items.len();

        let write = PromotionWrite {
            enrollment: NewEnrollment {
                student_id: student.id,
                session_id: batch.target_session_id,
                class_grade: batch.target_class.clone(),
                section: batch.target_section.clone(),
            },
            line_items,
            carried_items: close_line_items(&source),
        };
        let enrollment = store::call(
            &self.policy,
            "promote_student",
            self.enrollments.promote_student(write),
        )
        .await?;

        Ok(PromotedStudent {
            student_id: student.id,
            enrollment_id: enrollment.id,
            line_items: count,
            carried_forward,
            outstanding,
        })
    }

    async fn require_session(&self, id: AcademicSessionId) -> Result<(), LedgerError> {
        store::read(&self.policy, "fetch_session", || {
            self.sessions.fetch_session(id)
        })
        .await?
        .map(|_| ())
        .ok_or(LedgerError::SessionNotFound(id))
    }

    async fn enrollment_exists(
        &self,
        student_id: StudentId,
        session_id: AcademicSessionId,
    ) -> Result<bool, LedgerError> {
        let found = store::read(&self.policy, "find_enrollment", || {
            self.enrollments.find_enrollment(student_id, session_id)
        })
        .await?;
        Ok(found.is_some())
    }

    async fn log(&self, actor: &str, description: String) {
        audit::record(
            &self.audit,
            &self.policy,
            NewActivityLog::new(actor, ActivityAction::Promotion, MODULE, description),
        )
        .await;
    }
}
