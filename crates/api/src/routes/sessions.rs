//! Academic session routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use kosh_core::session::AcademicSession;
use kosh_shared::types::AcademicSessionId;
use serde::Deserialize;

use crate::extractors::{Actor, JsonBody};
use crate::{ApiError, AppState};

/// Creates the session routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(list_sessions).post(create_session))
        .route("/sessions/active", get(active_session))
        .route("/sessions/{session_id}", get(get_session))
        .route("/sessions/{session_id}/activate", post(activate_session))
}

/// Request body for creating a session.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    /// Session name, `YYYY-YY`.
    pub name: String,
}

/// GET `/sessions` - All sessions, newest first.
async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<Vec<AcademicSession>>, ApiError> {
    Ok(Json(state.sessions().list_sessions().await?))
}

/// POST `/sessions` - Create an inactive session.
async fn create_session(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(body): JsonBody<CreateSessionRequest>,
) -> Result<(StatusCode, Json<AcademicSession>), ApiError> {
    let session = state
        .sessions()
        .create_session(&body.name, actor.name())
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET `/sessions/active` - The active session, or `null`.
async fn active_session(
    State(state): State<AppState>,
) -> Result<Json<Option<AcademicSession>>, ApiError> {
    Ok(Json(state.sessions().active_session().await?))
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<AcademicSessionId>,
) -> Result<Json<AcademicSession>, ApiError> {
    Ok(Json(state.sessions().session(session_id).await?))
}

/// POST `/sessions/{session_id}/activate` - Make this the only active session.
async fn activate_session(
    State(state): State<AppState>,
    actor: Actor,
    Path(session_id): Path<AcademicSessionId>,
) -> Result<Json<AcademicSession>, ApiError> {
    let session = state
        .sessions()
        .set_active_session(session_id, actor.name())
        .await?;
    Ok(Json(session))
}
