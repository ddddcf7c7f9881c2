//! HTTP API layer with Axum routes and extractors.
//!
//! This crate provides:
//! - REST API routes under `/api/v1`
//! - The `x-actor` request extractor
//! - JSON error responses

pub mod error;
pub mod extractors;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use kosh_core::StorePolicy;
use kosh_core::enrollment::EnrollmentService;
use kosh_core::expenses::ExpenseService;
use kosh_core::ledger::LedgerService;
use kosh_core::promotion::PromotionCoordinator;
use kosh_core::reports::ReportService;
use kosh_core::session::SessionService;
use kosh_db::{
    ActivityRepository, EnrollmentRepository, ExpenseRepository, FeeRepository, SessionRepository,
};
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Arc<DatabaseConnection>,
    /// Timeouts and retry budgets for store calls.
    pub policy: StorePolicy,
}

impl AppState {
    /// Creates state over a connection pool.
    #[must_use]
    pub fn new(db: DatabaseConnection, policy: StorePolicy) -> Self {
        Self {
            db: Arc::new(db),
            policy,
        }
    }

    fn conn(&self) -> DatabaseConnection {
        (*self.db).clone()
    }

    /// Ledger engine over the database.
    #[must_use]
    pub fn ledger(&self) -> LedgerService<FeeRepository, ActivityRepository> {
        LedgerService::new(
            FeeRepository::new(self.conn()),
            ActivityRepository::new(self.conn()),
            self.policy,
        )
    }

    /// Session manager over the database.
    #[must_use]
    pub fn sessions(&self) -> SessionService<SessionRepository, ActivityRepository> {
        SessionService::new(
            SessionRepository::new(self.conn()),
            ActivityRepository::new(self.conn()),
            self.policy,
        )
    }

    /// Student registration and enrollment over the database.
    #[must_use]
    pub fn enrollments(
        &self,
    ) -> EnrollmentService<EnrollmentRepository, SessionRepository, ActivityRepository> {
        EnrollmentService::new(
            EnrollmentRepository::new(self.conn()),
            SessionRepository::new(self.conn()),
            ActivityRepository::new(self.conn()),
            self.policy,
        )
    }

    /// Promotion coordinator over the database.
    #[must_use]
    pub fn promotions(
        &self,
    ) -> PromotionCoordinator<
        FeeRepository,
        EnrollmentRepository,
        SessionRepository,
        ActivityRepository,
    > {
        PromotionCoordinator::new(
            FeeRepository::new(self.conn()),
            EnrollmentRepository::new(self.conn()),
            SessionRepository::new(self.conn()),
            ActivityRepository::new(self.conn()),
            self.policy,
        )
    }

    /// Expense register over the database.
    #[must_use]
    pub fn expenses(
        &self,
    ) -> ExpenseService<ExpenseRepository, SessionRepository, ActivityRepository> {
        ExpenseService::new(
            ExpenseRepository::new(self.conn()),
            SessionRepository::new(self.conn()),
            ActivityRepository::new(self.conn()),
            self.policy,
        )
    }

    /// Reports over the database.
    #[must_use]
    pub fn reports(&self) -> ReportService<FeeRepository, ExpenseRepository, ActivityRepository> {
        ReportService::new(
            FeeRepository::new(self.conn()),
            ExpenseRepository::new(self.conn()),
            ActivityRepository::new(self.conn()),
            self.policy,
        )
    }
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
