//! Student registration and enrollment.

use kosh_shared::types::{AcademicSessionId, StudentId};
use tracing::{info, instrument};

use super::types::{Enrollment, NewEnrollment, NewStudent, Student, StudentStatus, is_known_class};
use crate::audit::{self, ActivityAction, ActivitySink, NewActivityLog};
use crate::ledger::LedgerError;
use crate::store::{self, EnrollmentStore, SessionStore, StorePolicy};

const MODULE: &str = "students";

/// Registers students and enrolls them into sessions.
pub struct EnrollmentService<E, S, A> {
    enrollments: E,
    sessions: S,
    audit: A,
    policy: StorePolicy,
}

impl<E: EnrollmentStore, S: SessionStore, A: ActivitySink> EnrollmentService<E, S, A> {
    /// Creates a service over the given store handles.
    pub const fn new(enrollments: E, sessions: S, audit: A, policy: StorePolicy) -> Self {
        Self {
            enrollments,
            sessions,
            audit,
            policy,
        }
    }

    /// Registers a new student identity.
    ///
    /// # Errors
    ///
    /// `Validation` when a required field is blank or the phone number does
    /// not have 10 to 15 digits.
    #[instrument(skip_all, fields(scholar_no = %input.scholar_no))]
    pub async fn register_student(
        &self,
        input: NewStudent,
        actor: &str,
    ) -> Result<Student, LedgerError> {
        let input = normalize(input)?;
        let student = store::call(
            &self.policy,
            "insert_student",
            self.enrollments.insert_student(input),
        )
        .await?;

        info!(student_id = %student.id, "Student registered");
        self.log(
            actor,
            ActivityAction::Create,
            format!("Registered {} ({})", student.full_name(), student.scholar_no),
        )
        .await;
        Ok(student)
    }

    /// Enrolls a student into a session.
    ///
    /// # Errors
    ///
    /// - `StudentNotFound` / `SessionNotFound` for unknown ids
    /// - `Validation` for an unknown class or an inactive student
    /// - `DuplicateEnrollment` if the student is already in that session
    #[instrument(skip(self, section))]
    pub async fn enroll_student(
        &self,
        student_id: StudentId,
        session_id: AcademicSessionId,
        class_grade: &str,
        section: Option<String>,
        actor: &str,
    ) -> Result<Enrollment, LedgerError> {
        if !is_known_class(class_grade) {
            return Err(LedgerError::Validation(format!(
                "Unknown class grade: {class_grade}"
            )));
        }

        let student = self.student(student_id).await?;
        if student.status == StudentStatus::Inactive {
            return Err(LedgerError::Validation(format!(
                "{} is inactive and cannot be enrolled",
                student.full_name()
            )));
        }

        store::read(&self.policy, "fetch_session", || {
            self.sessions.fetch_session(session_id)
        })
        .await?
        .ok_or(LedgerError::SessionNotFound(session_id))?;

        let existing = store::read(&self.policy, "find_enrollment", || {
            self.enrollments.find_enrollment(student_id, session_id)
        })
        .await?;
        if existing.is_some() {
            return Err(LedgerError::DuplicateEnrollment {
                students: vec![student.full_name()],
            });
        }

        let enrollment = store::call(
            &self.policy,
            "insert_enrollment",
            self.enrollments.insert_enrollment(NewEnrollment {
                student_id,
                session_id,
                class_grade: class_grade.to_string(),
                section: section.map(|s| s.trim().to_uppercase()).filter(|s| !s.is_empty()),
            }),
        )
        .await?;

        info!(enrollment_id = %enrollment.id, "Student enrolled");
        self.log(
            actor,
            ActivityAction::Create,
            format!("Enrolled {} in class {class_grade}", student.full_name()),
        )
        .await;
        Ok(enrollment)
    }

    /// Marks a student inactive. History and balances are kept.
    #[instrument(skip(self))]
    pub async fn deactivate_student(
        &self,
        student_id: StudentId,
        actor: &str,
    ) -> Result<Student, LedgerError> {
        let student = store::call(
            &self.policy,
            "set_student_status",
            self.enrollments
                .set_student_status(student_id, StudentStatus::Inactive),
        )
        .await?
        .ok_or(LedgerError::StudentNotFound(student_id))?;

        info!("Student deactivated");
        self.log(
            actor,
            ActivityAction::Delete,
            format!("Deactivated {} ({})", student.full_name(), student.scholar_no),
        )
        .await;
        Ok(student)
    }

    /// A student by id.
    pub async fn student(&self, student_id: StudentId) -> Result<Student, LedgerError> {
        store::read(&self.policy, "fetch_student", || {
            self.enrollments.fetch_student(student_id)
        })
        .await?
        .ok_or(LedgerError::StudentNotFound(student_id))
    }

    async fn log(&self, actor: &str, action: ActivityAction, description: String) {
        audit::record(
            &self.audit,
            &self.policy,
            NewActivityLog::new(actor, action, MODULE, description),
        )
        .await;
    }
}

fn normalize(input: NewStudent) -> Result<NewStudent, LedgerError> {
    let required = |field: &str, value: String| -> Result<String, LedgerError> {
        let value = value.trim().to_string();
        if value.is_empty() {
            return Err(LedgerError::Validation(format!("{field} is required")));
        }
        Ok(value)
    };

    let scholar_no = required("Scholar number", input.scholar_no)?;
    let first_name = required("First name", input.first_name)?;
    let parent_name = required("Parent name", input.parent_name)?;
    let parent_phone = required("Parent phone", input.parent_phone)?;

    let digits = parent_phone.chars().filter(char::is_ascii_digit).count();
    let allowed = parent_phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-'));
    if !allowed || !(10..=15).contains(&digits) {
        return Err(LedgerError::Validation(format!(
            "Invalid parent phone: {parent_phone}"
        )));
    }

    Ok(NewStudent {
        scholar_no,
        first_name,
        last_name: input.last_name.trim().to_string(),
        parent_name,
        parent_phone,
        parent_email: input
            .parent_email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty()),
    })
}
