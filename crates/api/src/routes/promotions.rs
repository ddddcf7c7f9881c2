//! Batch promotion routes.

use axum::{Json, Router, extract::State, routing::post};
use kosh_core::promotion::{PromotionBatch, PromotionReport};

use crate::extractors::{Actor, JsonBody};
use crate::{ApiError, AppState};

/// Creates the promotion routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/promotions", post(promote))
}

/// POST `/promotions` - Promote a batch of students into a new session.
///
/// Precondition failures reject the whole batch. Once writing starts the
/// report says who was promoted, who failed and who was not attempted.
async fn promote(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(batch): JsonBody<PromotionBatch>,
) -> Result<Json<PromotionReport>, ApiError> {
    let report = state.promotions().promote(batch, actor.name()).await?;
    Ok(Json(report))
}
