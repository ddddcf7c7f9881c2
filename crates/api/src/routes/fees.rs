//! Fee assignment and payment routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use kosh_core::ledger::{
    FeeAssignment, FeeEdit, FeeLineItem, FeeTransaction, PaymentInput, PaymentMethod,
    PaymentReceipt, TransactionFilter,
};
use kosh_shared::types::{FeeLineItemId, PageRequest, PageResponse};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::extractors::{Actor, JsonBody};
use crate::{ApiError, AppState};

/// Creates the fee routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/fees", post(add_fee))
        .route("/fees/transactions", get(list_transactions))
        .route("/fees/{line_item_id}", patch(edit_fee).delete(remove_fee))
        .route("/fees/{line_item_id}/payments", post(record_payment))
}

/// Request body for a payment against one line item.
#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    /// Amount received.
    pub amount: Decimal,
    /// How it was paid.
    pub method: PaymentMethod,
    /// Receipt, cheque or UPI reference.
    #[serde(default)]
    pub reference: Option<String>,
    /// Free-text remarks.
    #[serde(default)]
    pub remarks: Option<String>,
}

async fn add_fee(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(body): JsonBody<FeeAssignment>,
) -> Result<(StatusCode, Json<FeeLineItem>), ApiError> {
    let item = state.ledger().add_fee_assignment(body, actor.name()).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn edit_fee(
    State(state): State<AppState>,
    actor: Actor,
    Path(line_item_id): Path<FeeLineItemId>,
    JsonBody(body): JsonBody<FeeEdit>,
) -> Result<Json<FeeLineItem>, ApiError> {
    let item = state
        .ledger()
        .edit_fee_assignment(line_item_id, body, actor.name())
        .await?;
    Ok(Json(item))
}

async fn remove_fee(
    State(state): State<AppState>,
    actor: Actor,
    Path(line_item_id): Path<FeeLineItemId>,
) -> Result<StatusCode, ApiError> {
    state
        .ledger()
        .remove_fee_assignment(line_item_id, actor.name())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST `/fees/{line_item_id}/payments` - Record a payment. The line item
/// and the transaction are written together or not at all.
async fn record_payment(
    State(state): State<AppState>,
    actor: Actor,
    Path(line_item_id): Path<FeeLineItemId>,
    JsonBody(body): JsonBody<PaymentRequest>,
) -> Result<(StatusCode, Json<PaymentReceipt>), ApiError> {
    let input = PaymentInput {
        line_item_id,
        amount: body.amount,
        method: body.method,
        reference: body.reference,
        remarks: body.remarks,
    };
    let receipt = state.ledger().record_payment(input, actor.name()).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// GET `/fees/transactions` - Payments matching the filter, newest first,
/// one page at a time.
async fn list_transactions(
    State(state): State<AppState>,
    Query(filter): Query<TransactionFilter>,
    Query(page): Query<PageRequest>,
) -> Result<Json<PageResponse<FeeTransaction>>, ApiError> {
    let page = page.clamped();
    let txs = state.ledger().transactions(filter).await?;
    let total = u64::try_from(txs.len()).unwrap_or(u64::MAX);
    Ok(Json(PageResponse::new(
        page.slice(&txs),
        page.page,
        page.per_page,
        total,
    )))
}
