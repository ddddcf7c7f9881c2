//! Student, enrollment and student ledger routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use kosh_core::LedgerError;
use kosh_core::enrollment::{Enrollment, NewStudent, Student};
use kosh_core::ledger::{FeeSummary, StudentLedger};
use kosh_shared::types::{AcademicSessionId, StudentId};
use serde::Deserialize;

use crate::extractors::{Actor, JsonBody};
use crate::{ApiError, AppState};

/// Creates the student routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/students", post(register_student))
        .route("/students/{student_id}", get(get_student))
        .route("/students/{student_id}/enrollments", post(enroll_student))
        .route("/students/{student_id}/deactivate", post(deactivate_student))
        .route("/students/{student_id}/ledger", get(student_ledger))
        .route("/students/{student_id}/summary", get(fee_summary))
}

/// Request body for enrolling a student in a session.
#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    /// Session to enroll in.
    pub session_id: AcademicSessionId,
    /// Class, e.g. `5th`.
    pub class_grade: String,
    /// Section, e.g. `A`.
    #[serde(default)]
    pub section: Option<String>,
}

/// Query selecting a session; the active session when absent.
#[derive(Debug, Default, Deserialize)]
pub struct SessionQuery {
    /// Session to read.
    pub session_id: Option<AcademicSessionId>,
}

async fn register_student(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(body): JsonBody<NewStudent>,
) -> Result<(StatusCode, Json<Student>), ApiError> {
    let student = state
        .enrollments()
        .register_student(body, actor.name())
        .await?;
    Ok((StatusCode::CREATED, Json(student)))
}

async fn get_student(
    State(state): State<AppState>,
    Path(student_id): Path<StudentId>,
) -> Result<Json<Student>, ApiError> {
    Ok(Json(state.enrollments().student(student_id).await?))
}

async fn enroll_student(
    State(state): State<AppState>,
    actor: Actor,
    Path(student_id): Path<StudentId>,
    JsonBody(body): JsonBody<EnrollRequest>,
) -> Result<(StatusCode, Json<Enrollment>), ApiError> {
    let enrollment = state
        .enrollments()
        .enroll_student(
            student_id,
            body.session_id,
            &body.class_grade,
            body.section,
            actor.name(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

async fn deactivate_student(
    State(state): State<AppState>,
    actor: Actor,
    Path(student_id): Path<StudentId>,
) -> Result<Json<Student>, ApiError> {
    let student = state
        .enrollments()
        .deactivate_student(student_id, actor.name())
        .await?;
    Ok(Json(student))
}

/// GET `/students/{student_id}/ledger` - Line items, canonical breakdown,
/// summary and payments for one session.
async fn student_ledger(
    State(state): State<AppState>,
    Path(student_id): Path<StudentId>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<StudentLedger>, ApiError> {
    let session_id = match query.session_id {
        Some(id) => id,
        None => state
            .sessions()
            .active_session()
            .await?
            .map(|s| s.id)
            .ok_or_else(|| {
                LedgerError::Validation("No active session; pass session_id".to_string())
            })?,
    };
    Ok(Json(state.ledger().student_ledger(student_id, session_id).await?))
}

/// GET `/students/{student_id}/summary` - Totals across one session, or all
/// sessions when `session_id` is absent.
async fn fee_summary(
    State(state): State<AppState>,
    Path(student_id): Path<StudentId>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<FeeSummary>, ApiError> {
    Ok(Json(
        state
            .ledger()
            .fee_summary(student_id, query.session_id)
            .await?,
    ))
}
