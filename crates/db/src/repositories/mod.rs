//! Repository implementations of the `kosh-core` store traits.
//!
//! Repositories translate between SeaORM models and domain values. They do
//! no business validation; every rule lives in `kosh-core`. Database errors
//! are mapped to [`PersistenceError`], with unique-constraint violations
//! reported as [`PersistenceError::Conflict`].

pub mod activity;
pub mod enrollment;
pub mod expense;
pub mod fee;
pub mod session;

pub use activity::ActivityRepository;
pub use enrollment::EnrollmentRepository;
pub use expense::ExpenseRepository;
pub use fee::FeeRepository;
pub use session::SessionRepository;

use chrono::{DateTime, Utc};
use kosh_core::PersistenceError;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{DbErr, SqlErr};

/// Maps a database error raised by `operation`.
pub(crate) fn db_err(operation: &'static str) -> impl FnOnce(DbErr) -> PersistenceError {
    move |err| match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(message)) => {
            PersistenceError::Conflict { operation, message }
        }
        _ => PersistenceError::store(operation, err),
    }
}

/// Error for a stored value that does not decode.
pub(crate) fn corrupt(
    operation: &'static str,
    message: impl std::fmt::Display,
) -> PersistenceError {
    PersistenceError::Corrupt {
        operation,
        message: message.to_string(),
    }
}

pub(crate) fn utc(ts: DateTimeWithTimeZone) -> DateTime<Utc> {
    ts.with_timezone(&Utc)
}
