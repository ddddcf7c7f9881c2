//! API route definitions.

use axum::Router;

use crate::AppState;

pub mod expenses;
pub mod fees;
pub mod health;
pub mod promotions;
pub mod reports;
pub mod sessions;
pub mod students;

/// Creates the API router with all routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(sessions::routes())
        .merge(students::routes())
        .merge(fees::routes())
        .merge(expenses::routes())
        .merge(promotions::routes())
        .merge(reports::routes())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use kosh_core::StorePolicy;
    use sea_orm::DatabaseConnection;
    use tower::ServiceExt;

    use crate::{AppState, create_router};

    fn app() -> axum::Router {
        let policy = StorePolicy {
            call_timeout: Duration::from_millis(200),
            read_retries: 0,
            read_backoff: Duration::from_millis(1),
            cas_retries: 0,
        };
        create_router(AppState::new(DatabaseConnection::Disconnected, policy))
    }

    async fn send(request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, json) = send(
            Request::get("/api/v1/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
    }

    #[tokio::test]
    async fn test_mutation_requires_actor() {
        let (status, json) = send(
            Request::post("/api/v1/sessions")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"name":"2025-26"}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_invalid_session_name_rejected_before_store() {
        let (status, json) = send(
            Request::post("/api/v1/sessions")
                .header("content-type", "application/json")
                .header("x-actor", "admin")
                .body(Body::from(r#"{"name":"2025-27"}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_invalid_fee_increase_rejected_before_store() {
        let body = serde_json::json!({
            "student_ids": ["0190f5c2-8a4b-7c3d-9e1f-2a3b4c5d6e7f"],
            "source_session_id": "0190f5c2-8a4b-7c3d-9e1f-2a3b4c5d6e70",
            "target_session_id": "0190f5c2-8a4b-7c3d-9e1f-2a3b4c5d6e71",
            "target_class": "6th",
            "fee_increase_percent": "25"
        });
        let (status, json) = send(
            Request::post("/api/v1/promotions")
                .header("content-type", "application/json")
                .header("x-actor", "admin")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["error"], "INVALID_FEE_INCREASE");
    }

    #[tokio::test]
    async fn test_unknown_fee_type_uses_error_envelope() {
        let body = serde_json::json!({
            "student_id": "0190f5c2-8a4b-7c3d-9e1f-2a3b4c5d6e7f",
            "session_id": "0190f5c2-8a4b-7c3d-9e1f-2a3b4c5d6e70",
            "fee_type": "hostel",
            "total_amount": "5000"
        });
        let (status, json) = send(
            Request::post("/api/v1/fees")
                .header("content-type", "application/json")
                .header("x-actor", "clerk")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "VALIDATION_ERROR");
        assert!(json["message"].as_str().unwrap().contains("hostel"));
    }

    #[tokio::test]
    async fn test_malformed_payment_body_uses_error_envelope() {
        let (status, json) = send(
            Request::post("/api/v1/fees/0190f5c2-8a4b-7c3d-9e1f-2a3b4c5d6e7f/payments")
                .header("content-type", "application/json")
                .header("x-actor", "clerk")
                .body(Body::from(r#"{"amount":"500","method":"paypal"}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_expense_validated_before_store() {
        let body = serde_json::json!({
            "title": "Diesel",
            "category": "transport",
            "amount": "0",
            "expense_date": "2025-07-04"
        });
        let (status, json) = send(
            Request::post("/api/v1/expenses")
                .header("content-type", "application/json")
                .header("x-actor", "clerk")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_unknown_expense_category_rejected() {
        let body = serde_json::json!({
            "title": "Pens",
            "category": "stationery",
            "amount": "120",
            "expense_date": "2025-07-04"
        });
        let (status, json) = send(
            Request::post("/api/v1/expenses")
                .header("content-type", "application/json")
                .header("x-actor", "clerk")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_reversed_financial_period_rejected() {
        let (status, json) = send(
            Request::get("/api/v1/reports/financial-overview?from=2025-08-01&to=2025-07-01")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_unreachable_store_is_server_error() {
        let (status, json) = send(
            Request::get("/api/v1/sessions").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "DATABASE_ERROR");
    }
}
