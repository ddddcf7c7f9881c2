//! Persistence contracts for the fee ledger.
//!
//! The ledger never talks to a database directly. It reads and writes rows
//! through the traits below, which are a pure translation layer: no business
//! validation happens behind them. `kosh-db` implements them with SeaORM and
//! the unit tests implement them in memory.
//!
//! Every call made by a service goes through [`call`] (timeout) or [`read`]
//! (timeout + retry with backoff). Writes are never retried on error.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use kosh_shared::LedgerConfig;
use kosh_shared::types::{AcademicSessionId, FeeLineItemId, StudentId};
use thiserror::Error;
use tracing::warn;

use crate::enrollment::{
    ClassFeeStructure, Enrollment, NewEnrollment, NewStudent, Student, StudentStatus,
};
use crate::expenses::{Expense, ExpenseFilter, NewExpense};
use crate::ledger::{
    FeeLineItem, FeeLineItemPatch, FeeTransaction, NewFeeLineItem, OutstandingLineItem,
    PaymentCommit, PaymentReceipt, TransactionFilter,
};
use crate::promotion::PromotionWrite;
use crate::session::AcademicSession;

/// Failure of the external persistence service.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The store rejected the operation or could not be reached.
    #[error("{operation} failed: {message}")]
    Store {
        /// Store operation name.
        operation: &'static str,
        /// Underlying cause.
        message: String,
    },

    /// The call did not complete within the configured timeout.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// Store operation name.
        operation: &'static str,
        /// Timeout that expired.
        timeout: Duration,
    },

    /// A uniqueness constraint or a version guard rejected the write.
    #[error("{operation} conflicted with an existing row: {message}")]
    Conflict {
        /// Store operation name.
        operation: &'static str,
        /// Underlying cause.
        message: String,
    },

    /// A stored row could not be decoded into a domain value.
    #[error("{operation} returned an undecodable row: {message}")]
    Corrupt {
        /// Store operation name.
        operation: &'static str,
        /// What could not be decoded.
        message: String,
    },
}

impl PersistenceError {
    /// Wraps an arbitrary store failure.
    pub fn store(operation: &'static str, cause: impl std::fmt::Display) -> Self {
        Self::Store {
            operation,
            message: cause.to_string(),
        }
    }

    /// Returns the name of the failed operation.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Store { operation, .. }
            | Self::Timeout { operation, .. }
            | Self::Conflict { operation, .. }
            | Self::Corrupt { operation, .. } => operation,
        }
    }

    /// Returns true if repeating an idempotent read may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Store { .. } | Self::Timeout { .. })
    }
}

/// Timeouts and retry budgets applied to store calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorePolicy {
    /// Per-call timeout.
    pub call_timeout: Duration,
    /// Extra attempts for idempotent reads on transient failure.
    pub read_retries: u32,
    /// Backoff before the first read retry; doubles each attempt.
    pub read_backoff: Duration,
    /// Extra compare-and-swap attempts when a line item changed underneath us.
    pub cas_retries: u32,
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self::from(&LedgerConfig::default())
    }
}

impl From<&LedgerConfig> for StorePolicy {
    fn from(config: &LedgerConfig) -> Self {
        Self {
            call_timeout: config.store_timeout(),
            read_retries: config.read_retries,
            read_backoff: config.read_backoff(),
            cas_retries: config.payment_max_retries,
        }
    }
}

/// Runs one store call under the policy's timeout.
pub async fn call<T, Fut>(
    policy: &StorePolicy,
    operation: &'static str,
    fut: Fut,
) -> Result<T, PersistenceError>
where
    Fut: Future<Output = Result<T, PersistenceError>>,
{
    match tokio::time::timeout(policy.call_timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(PersistenceError::Timeout {
            operation,
            timeout: policy.call_timeout,
        }),
    }
}

/// Runs an idempotent read, retrying transient failures with exponential backoff.
pub async fn read<T, F, Fut>(
    policy: &StorePolicy,
    operation: &'static str,
    mut op: F,
) -> Result<T, PersistenceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PersistenceError>>,
{
    let mut attempt = 0;
    let mut backoff = policy.read_backoff;
    loop {
        match call(policy, operation, op()).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.read_retries => {
                attempt += 1;
                warn!(operation, attempt, error = %err, "Retrying store read");
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
            }
            Err(err) => return Err(err),
        }
    }
}

/// Fee line items and payment transactions.
#[async_trait]
pub trait FeeStore: Send + Sync {
    /// Line items of a student, optionally restricted to one session.
    async fn fetch_fee_line_items(
        &self,
        student_id: StudentId,
        session_id: Option<AcademicSessionId>,
    ) -> Result<Vec<FeeLineItem>, PersistenceError>;

    /// Every line item billed in a session.
    async fn fetch_session_line_items(
        &self,
        session_id: AcademicSessionId,
    ) -> Result<Vec<FeeLineItem>, PersistenceError>;

    /// A single line item.
    async fn fetch_fee_line_item(
        &self,
        id: FeeLineItemId,
    ) -> Result<Option<FeeLineItem>, PersistenceError>;

    /// Line items with `outstanding_amount > 0`, joined with their student.
    async fn fetch_outstanding_line_items(
        &self,
        session_id: Option<AcademicSessionId>,
    ) -> Result<Vec<OutstandingLineItem>, PersistenceError>;

    /// Inserts a new line item with version 1.
    async fn insert_fee_line_item(
        &self,
        item: NewFeeLineItem,
    ) -> Result<FeeLineItem, PersistenceError>;

    /// Compare-and-swap update. Returns `None` when `patch.expected_version`
    /// no longer matches the stored row.
    async fn update_fee_line_item(
        &self,
        id: FeeLineItemId,
        patch: FeeLineItemPatch,
    ) -> Result<Option<FeeLineItem>, PersistenceError>;

    /// Deletes a line item if it is still at `expected_version`.
    async fn delete_fee_line_item(
        &self,
        id: FeeLineItemId,
        expected_version: i64,
    ) -> Result<bool, PersistenceError>;

    /// Applies a payment atomically: balance update and transaction insert
    /// either both happen or neither does. Returns `None` when the line item
    /// moved past `commit.expected_version` or no longer covers the amount.
    async fn commit_payment(
        &self,
        commit: PaymentCommit,
    ) -> Result<Option<PaymentReceipt>, PersistenceError>;

    /// Payment transactions matching the filter, newest first.
    async fn fetch_transactions(
        &self,
        filter: TransactionFilter,
    ) -> Result<Vec<FeeTransaction>, PersistenceError>;
}

/// Students, enrollments and class fee structures.
#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    /// Creates a student identity.
    async fn insert_student(&self, student: NewStudent) -> Result<Student, PersistenceError>;

    /// A single student.
    async fn fetch_student(&self, id: StudentId) -> Result<Option<Student>, PersistenceError>;

    /// Flips the status flag; students are never physically deleted.
    async fn set_student_status(
        &self,
        id: StudentId,
        status: StudentStatus,
    ) -> Result<Option<Student>, PersistenceError>;

    /// Enrolls a student into a session.
    async fn insert_enrollment(
        &self,
        enrollment: NewEnrollment,
    ) -> Result<Enrollment, PersistenceError>;

    /// The student's enrollment in a session, if any.
    async fn find_enrollment(
        &self,
        student_id: StudentId,
        session_id: AcademicSessionId,
    ) -> Result<Option<Enrollment>, PersistenceError>;

    /// The active fee structure of a class grade.
    async fn fetch_class_fee_structure(
        &self,
        class_grade: &str,
    ) -> Result<Option<ClassFeeStructure>, PersistenceError>;

    /// Writes one student's promotion atomically: the enrollment, the new
    /// line items, and the closing of every carried source item. Fails with
    /// `Conflict` and writes nothing if a carried item moved past its
    /// expected version.
    async fn promote_student(&self, write: PromotionWrite) -> Result<Enrollment, PersistenceError>;
}

/// Academic sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Creates an inactive session.
    async fn insert_session(&self, name: &str) -> Result<AcademicSession, PersistenceError>;

    /// All sessions, newest first.
    async fn list_sessions(&self) -> Result<Vec<AcademicSession>, PersistenceError>;

    /// A single session.
    async fn fetch_session(
        &self,
        id: AcademicSessionId,
    ) -> Result<Option<AcademicSession>, PersistenceError>;

    /// The active session, if any.
    async fn fetch_active_session(&self) -> Result<Option<AcademicSession>, PersistenceError>;

    /// Makes `id` the only active session in one atomic step.
    /// Returns false (and changes nothing) when `id` does not exist.
    async fn activate_session(&self, id: AcademicSessionId) -> Result<bool, PersistenceError>;
}

/// School expenses.
#[async_trait]
pub trait ExpenseStore: Send + Sync {
    /// Appends an expense.
    async fn insert_expense(&self, expense: NewExpense) -> Result<Expense, PersistenceError>;

    /// Expenses matching the filter, latest `expense_date` first.
    async fn fetch_expenses(
        &self,
        filter: ExpenseFilter,
    ) -> Result<Vec<Expense>, PersistenceError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> StorePolicy {
        StorePolicy {
            call_timeout: Duration::from_millis(50),
            read_retries: 2,
            read_backoff: Duration::from_millis(1),
            cas_retries: 3,
        }
    }

    #[test]
    fn test_policy_from_config() {
        let policy = StorePolicy::default();
        assert_eq!(policy.call_timeout, Duration::from_secs(10));
        assert_eq!(policy.read_retries, 2);
        assert_eq!(policy.cas_retries, 3);
    }

    #[tokio::test]
    async fn test_call_times_out() {
        let result: Result<(), _> = call(&fast_policy(), "slow_op", async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(())
        })
        .await;

        match result {
            Err(PersistenceError::Timeout { operation, .. }) => assert_eq!(operation, "slow_op"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_read_retries_transient_failures() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);

        let value = read(&fast_policy(), "flaky_read", || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(PersistenceError::store("flaky_read", "connection reset"))
                } else {
                    Ok(7)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_read_gives_up_after_budget() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);

        let result: Result<u8, _> = read(&fast_policy(), "down", || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(PersistenceError::store("down", "refused"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_read_does_not_retry_corrupt_rows() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);

        let result: Result<u8, _> = read(&fast_policy(), "decode", || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(PersistenceError::Corrupt {
                    operation: "decode",
                    message: "fee_type = 'hostel'".into(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(PersistenceError::Corrupt { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_transient_classification() {
        assert!(PersistenceError::store("op", "x").is_transient());
        assert!(
            PersistenceError::Timeout {
                operation: "op",
                timeout: Duration::from_secs(1)
            }
            .is_transient()
        );
        assert!(
            !PersistenceError::Conflict {
                operation: "op",
                message: "dup".into()
            }
            .is_transient()
        );
    }
}
