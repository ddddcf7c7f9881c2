//! Expense register routes.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
};
use chrono::NaiveDate;
use kosh_core::expenses::{Expense, ExpenseCategory, ExpenseFilter, ExpenseInput, ExpenseList};
use kosh_shared::types::AcademicSessionId;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::extractors::{Actor, JsonBody};
use crate::{ApiError, AppState};

/// Creates the expense routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/expenses", get(list_expenses).post(record_expense))
}

/// Request body for recording an expense.
#[derive(Debug, Deserialize)]
pub struct ExpenseRequest {
    /// Short title.
    pub title: String,
    /// Category, e.g. `salary`.
    pub category: ExpenseCategory,
    /// Amount paid out.
    pub amount: Decimal,
    /// Day the money went out, `YYYY-MM-DD`.
    pub expense_date: NaiveDate,
    /// Free-form details.
    #[serde(default)]
    pub description: Option<String>,
    /// Session to book against; the active session when absent.
    #[serde(default)]
    pub session_id: Option<AcademicSessionId>,
}

/// POST `/expenses` - Record money paid out.
async fn record_expense(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(body): JsonBody<ExpenseRequest>,
) -> Result<(StatusCode, Json<Expense>), ApiError> {
    let input = ExpenseInput {
        title: body.title,
        category: body.category,
        amount: body.amount,
        expense_date: body.expense_date,
        description: body.description,
        session_id: body.session_id,
    };
    let expense = state.expenses().record_expense(input, actor.name()).await?;
    Ok((StatusCode::CREATED, Json(expense)))
}

/// GET `/expenses` - Expenses matching the filter, latest first, with the total.
async fn list_expenses(
    State(state): State<AppState>,
    Query(filter): Query<ExpenseFilter>,
) -> Result<Json<ExpenseList>, ApiError> {
    Ok(Json(state.expenses().list_expenses(filter).await?))
}
