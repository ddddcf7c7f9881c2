//! Student, enrollment and class fee structure repository.

use async_trait::async_trait;
use chrono::Utc;
use kosh_core::PersistenceError;
use kosh_core::enrollment::{
    ClassFeeStructure, Enrollment, NewEnrollment, NewStudent, Student, StudentStatus,
};
use kosh_core::promotion::PromotionWrite;
use kosh_core::store::EnrollmentStore;
use kosh_shared::types::{AcademicSessionId, ClassFeeStructureId, EnrollmentId, StudentId};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use tracing::debug;

use super::fee::{new_line_item_model, versioned_update};
use super::{corrupt, db_err, utc};
use crate::entities::{class_fee_structures, enrollments, fee_line_items, students};

/// Repository for students and their per-session enrollments.
#[derive(Debug, Clone)]
pub struct EnrollmentRepository {
    db: DatabaseConnection,
}

impl EnrollmentRepository {
    /// Creates a new enrollment repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn student_from(
    operation: &'static str,
    m: students::Model,
) -> Result<Student, PersistenceError> {
    let status = StudentStatus::parse(&m.status)
        .ok_or_else(|| corrupt(operation, format!("unknown student status: {}", m.status)))?;
    Ok(Student {
        id: StudentId::from_uuid(m.id),
        scholar_no: m.scholar_no,
        first_name: m.first_name,
        last_name: m.last_name,
        parent_name: m.parent_name,
        parent_phone: m.parent_phone,
        parent_email: m.parent_email,
        status,
        created_at: utc(m.created_at),
    })
}

fn enrollment_from(m: enrollments::Model) -> Enrollment {
    Enrollment {
        id: EnrollmentId::from_uuid(m.id),
        student_id: StudentId::from_uuid(m.student_id),
        session_id: AcademicSessionId::from_uuid(m.session_id),
        class_grade: m.class_grade,
        section: m.section,
        created_at: utc(m.created_at),
    }
}

async fn insert_enrollment_with<C: ConnectionTrait>(
    conn: &C,
    enrollment: NewEnrollment,
) -> Result<enrollments::Model, sea_orm::DbErr> {
    enrollments::ActiveModel {
        id: Set(EnrollmentId::new().into_inner()),
        student_id: Set(enrollment.student_id.into_inner()),
        session_id: Set(enrollment.session_id.into_inner()),
        class_grade: Set(enrollment.class_grade),
        section: Set(enrollment.section),
        created_at: Set(Utc::now().into()),
    }
    .insert(conn)
    .await
}

#[async_trait]
impl EnrollmentStore for EnrollmentRepository {
    async fn insert_student(&self, student: NewStudent) -> Result<Student, PersistenceError> {
        const OP: &str = "insert_student";
        let now = Utc::now().into();
        let model = students::ActiveModel {
            id: Set(StudentId::new().into_inner()),
            scholar_no: Set(student.scholar_no),
            first_name: Set(student.first_name),
            last_name: Set(student.last_name),
            parent_name: Set(student.parent_name),
            parent_phone: Set(student.parent_phone),
            parent_email: Set(student.parent_email),
            status: Set(StudentStatus::Active.as_str().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
        .map_err(db_err(OP))?;

        student_from(OP, model)
    }

    async fn fetch_student(&self, id: StudentId) -> Result<Option<Student>, PersistenceError> {
        const OP: &str = "fetch_student";
        students::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err(OP))?
            .map(|m| student_from(OP, m))
            .transpose()
    }

    async fn set_student_status(
        &self,
        id: StudentId,
        status: StudentStatus,
    ) -> Result<Option<Student>, PersistenceError> {
        const OP: &str = "set_student_status";
        let updated = students::Entity::update_many()
            .col_expr(students::Column::Status, Expr::value(status.as_str()))
            .col_expr(students::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(students::Column::Id.eq(id.into_inner()))
            .exec_with_returning(&self.db)
            .await
            .map_err(db_err(OP))?;

        updated
            .into_iter()
            .next()
            .map(|m| student_from(OP, m))
            .transpose()
    }

    async fn insert_enrollment(
        &self,
        enrollment: NewEnrollment,
    ) -> Result<Enrollment, PersistenceError> {
        let model = insert_enrollment_with(&self.db, enrollment)
            .await
            .map_err(db_err("insert_enrollment"))?;
        Ok(enrollment_from(model))
    }

    async fn find_enrollment(
        &self,
        student_id: StudentId,
        session_id: AcademicSessionId,
    ) -> Result<Option<Enrollment>, PersistenceError> {
        let model = enrollments::Entity::find()
            .filter(enrollments::Column::StudentId.eq(student_id.into_inner()))
            .filter(enrollments::Column::SessionId.eq(session_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(db_err("find_enrollment"))?;

        Ok(model.map(enrollment_from))
    }

    async fn fetch_class_fee_structure(
        &self,
        class_grade: &str,
    ) -> Result<Option<ClassFeeStructure>, PersistenceError> {
        let model = class_fee_structures::Entity::find()
            .filter(class_fee_structures::Column::ClassGrade.eq(class_grade))
            .filter(class_fee_structures::Column::IsActive.eq(true))
            .one(&self.db)
            .await
            .map_err(db_err("fetch_class_fee_structure"))?;

        Ok(model.map(|m| ClassFeeStructure {
            id: ClassFeeStructureId::from_uuid(m.id),
            class_grade: m.class_grade,
            tuition_fee_yearly: m.tuition_fee_yearly,
            is_active: m.is_active,
        }))
    }

    /// Closes the carried source items, then writes the target enrollment
    /// and its line items, all in one database transaction.
    async fn promote_student(&self, write: PromotionWrite) -> Result<Enrollment, PersistenceError> {
        const OP: &str = "promote_student";
        let txn = self.db.begin().await.map_err(db_err(OP))?;

        for carried in write.carried_items {
            let closed = versioned_update(
                carried.line_item_id,
                carried.expected_version,
                carried.balance,
            )
            .exec(&txn)
            .await
            .map_err(db_err(OP))?;

            if closed.rows_affected == 0 {
                txn.rollback().await.map_err(db_err(OP))?;
                debug!(line_item_id = %carried.line_item_id, "Carried line item moved on");
                return Err(PersistenceError::Conflict {
                    operation: OP,
                    message: format!(
                        "line item {} changed during promotion",
                        carried.line_item_id
                    ),
                });
            }
        }

        let enrollment = insert_enrollment_with(&txn, write.enrollment)
            .await
            .map_err(db_err(OP))?;

        if !write.line_items.is_empty() {
            fee_line_items::Entity::insert_many(write.line_items.iter().map(new_line_item_model))
                .exec(&txn)
                .await
                .map_err(db_err(OP))?;
        }

        txn.commit().await.map_err(db_err(OP))?;
        Ok(enrollment_from(enrollment))
    }
}
