//! Ledger error types.
//!
//! Covers input validation, balance rules, promotion preconditions,
//! optimistic-concurrency exhaustion and failures of the backing store.

use kosh_shared::AppError;
use kosh_shared::types::{AcademicSessionId, FeeLineItemId, StudentId};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::store::PersistenceError;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Malformed or out-of-range input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Payment is not positive or exceeds what is owed.
    #[error("Invalid payment amount {amount}: outstanding is {outstanding}")]
    InvalidPaymentAmount {
        /// Amount offered.
        amount: Decimal,
        /// Outstanding amount at the time of the check.
        outstanding: Decimal,
    },

    /// Promotion fee increase outside `[0, 20]` percent.
    #[error("Fee increase must be between 0 and 20 percent, got {0}")]
    InvalidFeeIncrease(Decimal),

    /// Fees have been collected against the line item.
    #[error("Cannot remove fee line item {0}: payments have been recorded against it")]
    CannotRemovePaidFee(FeeLineItemId),

    /// The line item's dues were carried into a later session; pay or edit
    /// the later session's item instead.
    #[error("Fee line item {0} is closed: its dues were carried forward to the next session")]
    FeeCarriedForward(FeeLineItemId),

    // ========== Conflict Errors ==========
    /// Students already enrolled in the target session.
    #[error("Students already enrolled in the target session: {}", students.join(", "))]
    DuplicateEnrollment {
        /// Names of the colliding students.
        students: Vec<String>,
    },

    /// The line item kept changing underneath the compare-and-swap.
    #[error("Fee line item {line_item_id} was modified concurrently ({attempts} attempts)")]
    ConcurrentModification {
        /// The contended line item.
        line_item_id: FeeLineItemId,
        /// Attempts made before giving up.
        attempts: u32,
    },

    // ========== Not Found Errors ==========
    /// Line item does not exist.
    #[error("Fee line item not found: {0}")]
    FeeLineItemNotFound(FeeLineItemId),

    /// Student does not exist.
    #[error("Student not found: {0}")]
    StudentNotFound(StudentId),

    /// Academic session does not exist.
    #[error("Academic session not found: {0}")]
    SessionNotFound(AcademicSessionId),

    // ========== Store Errors ==========
    /// The backing store failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidPaymentAmount { .. } => "INVALID_PAYMENT_AMOUNT",
            Self::InvalidFeeIncrease(_) => "INVALID_FEE_INCREASE",
            Self::CannotRemovePaidFee(_) => "CANNOT_REMOVE_PAID_FEE",
            Self::FeeCarriedForward(_) => "FEE_CARRIED_FORWARD",
            Self::DuplicateEnrollment { .. } => "DUPLICATE_ENROLLMENT",
            Self::ConcurrentModification { .. } => "CONCURRENT_MODIFICATION",
            Self::FeeLineItemNotFound(_) => "FEE_LINE_ITEM_NOT_FOUND",
            Self::StudentNotFound(_) => "STUDENT_NOT_FOUND",
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::Persistence(PersistenceError::Timeout { .. }) => "STORE_TIMEOUT",
            Self::Persistence(PersistenceError::Conflict { .. }) => "CONFLICT",
            Self::Persistence(_) => "DATABASE_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - malformed input
            Self::Validation(_) => 400,

            // 422 Unprocessable - well-formed but breaks a ledger rule
            Self::InvalidPaymentAmount { .. }
            | Self::InvalidFeeIncrease(_)
            | Self::CannotRemovePaidFee(_)
            | Self::FeeCarriedForward(_) => 422,

            // 404 Not Found
            Self::FeeLineItemNotFound(_) | Self::StudentNotFound(_) | Self::SessionNotFound(_) => {
                404
            }

            // 409 Conflict
            Self::DuplicateEnrollment { .. }
            | Self::ConcurrentModification { .. }
            | Self::Persistence(PersistenceError::Conflict { .. }) => 409,

            // 504 Gateway Timeout
            Self::Persistence(PersistenceError::Timeout { .. }) => 504,

            // 500 Internal Server Error
            Self::Persistence(_) => 500,
        }
    }

    /// Returns true if the caller may retry the whole operation.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConcurrentModification { .. } => true,
            Self::Persistence(err) => err.is_transient(),
            _ => false,
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err {
            LedgerError::Validation(_) => Self::Validation(message),
            LedgerError::InvalidPaymentAmount { .. }
            | LedgerError::InvalidFeeIncrease(_)
            | LedgerError::CannotRemovePaidFee(_)
            | LedgerError::FeeCarriedForward(_) => Self::BusinessRule(message),
            LedgerError::FeeLineItemNotFound(_)
            | LedgerError::StudentNotFound(_)
            | LedgerError::SessionNotFound(_) => Self::NotFound(message),
            LedgerError::DuplicateEnrollment { .. }
            | LedgerError::ConcurrentModification { .. }
            | LedgerError::Persistence(PersistenceError::Conflict { .. }) => {
                Self::Conflict(message)
            }
            LedgerError::Persistence(PersistenceError::Timeout { .. }) => Self::Timeout(message),
            LedgerError::Persistence(_) => Self::Database(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            LedgerError::InvalidPaymentAmount {
                amount: dec!(600),
                outstanding: dec!(500),
            }
            .error_code(),
            "INVALID_PAYMENT_AMOUNT"
        );
        assert_eq!(
            LedgerError::InvalidFeeIncrease(dec!(25)).error_code(),
            "INVALID_FEE_INCREASE"
        );
        assert_eq!(
            LedgerError::DuplicateEnrollment { students: vec![] }.error_code(),
            "DUPLICATE_ENROLLMENT"
        );
        assert_eq!(
            LedgerError::Persistence(PersistenceError::store("fetch", "down")).error_code(),
            "DATABASE_ERROR"
        );
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(LedgerError::Validation("x".into()).http_status_code(), 400);
        assert_eq!(LedgerError::InvalidFeeIncrease(dec!(-1)).http_status_code(), 422);
        assert_eq!(
            LedgerError::FeeCarriedForward(FeeLineItemId::new()).http_status_code(),
            422
        );
        assert_eq!(
            LedgerError::StudentNotFound(StudentId::new()).http_status_code(),
            404
        );
        assert_eq!(
            LedgerError::ConcurrentModification {
                line_item_id: FeeLineItemId::new(),
                attempts: 4,
            }
            .http_status_code(),
            409
        );
        assert_eq!(
            LedgerError::Persistence(PersistenceError::Timeout {
                operation: "commit_payment",
                timeout: Duration::from_secs(10),
            })
            .http_status_code(),
            504
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(
            LedgerError::ConcurrentModification {
                line_item_id: FeeLineItemId::new(),
                attempts: 4,
            }
            .is_retryable()
        );
        assert!(LedgerError::Persistence(PersistenceError::store("x", "reset")).is_retryable());
        assert!(
            !LedgerError::InvalidPaymentAmount {
                amount: dec!(0),
                outstanding: dec!(10),
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_error_display() {
        let err = LedgerError::DuplicateEnrollment {
            students: vec!["Asha Verma".into(), "Ravi Kumar".into()],
        };
        assert_eq!(
            err.to_string(),
            "Students already enrolled in the target session: Asha Verma, Ravi Kumar"
        );

        let err = LedgerError::InvalidPaymentAmount {
            amount: dec!(600.00),
            outstanding: dec!(500.00),
        };
        assert_eq!(
            err.to_string(),
            "Invalid payment amount 600.00: outstanding is 500.00"
        );
    }

    #[test]
    fn test_into_app_error() {
        let app: AppError = LedgerError::InvalidFeeIncrease(dec!(30)).into();
        assert_eq!(app.status_code(), 422);

        let app: AppError = LedgerError::DuplicateEnrollment {
            students: vec!["Asha".into()],
        }
        .into();
        assert_eq!(app.error_code(), "CONFLICT");

        let app: AppError = LedgerError::Persistence(PersistenceError::Timeout {
            operation: "fetch_session",
            timeout: Duration::from_secs(10),
        })
        .into();
        assert_eq!(app.status_code(), 504);
    }
}
