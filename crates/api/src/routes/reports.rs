//! Report routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use kosh_core::audit::{ActivityFilter, ActivityLog};
use kosh_core::ledger::TransactionFilter;
use kosh_core::reports::{
    CollectionSummary, DefaulterFilter, DefaultersReport, FinancialOverview, FinancialPeriod,
    SessionFeeOverview,
};
use kosh_shared::types::AcademicSessionId;
use serde::Deserialize;

use crate::{ApiError, AppState};

/// Creates the report routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reports/defaulters", get(defaulters))
        .route("/reports/collections", get(collections))
        .route("/reports/financial-overview", get(financial_overview))
        .route("/reports/activity", get(activity))
        .route("/reports/sessions/{session_id}", get(session_overview))
}

/// Query for the defaulters report.
#[derive(Debug, Default, Deserialize)]
pub struct DefaultersQuery {
    /// Restrict to one session.
    pub session_id: Option<AcademicSessionId>,
    /// Restrict to one class.
    pub class_grade: Option<String>,
    /// Name, scholar number or phone fragment.
    pub search: Option<String>,
}

async fn defaulters(
    State(state): State<AppState>,
    Query(query): Query<DefaultersQuery>,
) -> Result<Json<DefaultersReport>, ApiError> {
    let filter = DefaulterFilter {
        class_grade: query.class_grade,
        search: query.search,
    };
    let report = state.reports().defaulters(query.session_id, &filter).await?;
    Ok(Json(report))
}

async fn collections(
    State(state): State<AppState>,
    Query(filter): Query<TransactionFilter>,
) -> Result<Json<CollectionSummary>, ApiError> {
    Ok(Json(state.reports().collections(filter).await?))
}

/// GET `/reports/financial-overview?from=YYYY-MM-DD&to=YYYY-MM-DD` - Fees
/// collected minus expenses over the period, both days included.
async fn financial_overview(
    State(state): State<AppState>,
    Query(period): Query<FinancialPeriod>,
) -> Result<Json<FinancialOverview>, ApiError> {
    Ok(Json(state.reports().financial_overview(period).await?))
}

async fn activity(
    State(state): State<AppState>,
    Query(filter): Query<ActivityFilter>,
) -> Result<Json<Vec<ActivityLog>>, ApiError> {
    Ok(Json(state.reports().activity_logs(filter).await?))
}

async fn session_overview(
    State(state): State<AppState>,
    Path(session_id): Path<AcademicSessionId>,
) -> Result<Json<SessionFeeOverview>, ApiError> {
    Ok(Json(state.reports().session_overview(session_id).await?))
}
