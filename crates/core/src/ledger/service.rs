//! Ledger service: fee assignment, payments and edits against a [`FeeStore`].
//!
//! Writes use optimistic concurrency. The service reads the line item,
//! computes the next balance, and asks the store to apply it only if the row
//! is still at the version it read. On a lost race it re-reads and tries
//! again, up to `StorePolicy::cas_retries` extra attempts.

use kosh_shared::types::{AcademicSessionId, FeeLineItemId, StudentId};
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use super::balance::{Balance, compute_fee_summary, with_canonical_fee_types};
use super::error::LedgerError;
use super::types::{
    CANONICAL_FEE_TYPES, FeeAssignment, FeeEdit, FeeLineItem, FeeLineItemPatch, FeeSummary,
    FeeTransaction, NewFeeLineItem, NewFeeTransaction, PaymentCommit, PaymentInput,
    PaymentReceipt, StudentLedger, TransactionFilter,
};
use crate::audit::{self, ActivityAction, ActivitySink, NewActivityLog};
use crate::store::{self, FeeStore, StorePolicy};

const MODULE: &str = "fees";

/// Fee ledger operations.
pub struct LedgerService<F, A> {
    fees: F,
    audit: A,
    policy: StorePolicy,
}

impl<F: FeeStore, A: ActivitySink> LedgerService<F, A> {
    /// Creates a service over the given store handles.
    pub const fn new(fees: F, audit: A, policy: StorePolicy) -> Self {
        Self {
            fees,
            audit,
            policy,
        }
    }

    /// Charges a student a new fee for a session.
    ///
    /// # Errors
    ///
    /// `Validation` for non-positive totals, negative carried dues, or a fee
    /// type the student already has in that session.
    #[instrument(
        skip(self, input),
        fields(student_id = %input.student_id, fee_type = %input.fee_type)
    )]
    pub async fn add_fee_assignment(
        &self,
        input: FeeAssignment,
        actor: &str,
    ) -> Result<FeeLineItem, LedgerError> {
        let balance = Balance::assigned(input.total_amount, input.previous_year_fees)?;

        let existing = self.line_items(input.student_id, Some(input.session_id)).await?;
        if existing.iter().any(|i| i.fee_type == input.fee_type) {
            return Err(LedgerError::Validation(format!(
                "{} is already assigned to this student for the session",
                input.fee_type.label()
            )));
        }

        let item = store::call(
            &self.policy,
            "insert_fee_line_item",
            self.fees.insert_fee_line_item(NewFeeLineItem {
                student_id: input.student_id,
                session_id: input.session_id,
                fee_type: input.fee_type,
                balance,
            }),
        )
        .await?;

        info!(line_item_id = %item.id, total = %item.total_amount, "Fee assigned");
        self.log(
            actor,
            ActivityAction::Create,
            format!(
                "Assigned {} of {} to student {}",
                item.fee_type.label(),
                item.outstanding_amount,
                item.student_id
            ),
        )
        .await;

        Ok(item)
    }

    /// Records a payment against a line item.
    ///
    /// The balance update and the transaction row are committed together; a
    /// rejected or failed payment leaves no trace.
    ///
    /// # Errors
    ///
    /// - `FeeLineItemNotFound` if the line item does not exist
    /// - `FeeCarriedForward` if a promotion already moved the dues on
    /// - `InvalidPaymentAmount` if the amount is not positive or exceeds what is owed
    /// - `ConcurrentModification` if the compare-and-swap kept losing
    #[instrument(
        skip(self, input),
        fields(line_item_id = %input.line_item_id, amount = %input.amount)
    )]
    pub async fn record_payment(
        &self,
        input: PaymentInput,
        actor: &str,
    ) -> Result<PaymentReceipt, LedgerError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let item = self.open_line_item(input.line_item_id).await?;
            let balance = item.balance().apply_payment(input.amount)?;

            let commit = PaymentCommit {
                line_item_id: item.id,
                expected_version: item.version,
                balance,
                transaction: NewFeeTransaction {
                    student_id: item.student_id,
                    session_id: item.session_id,
                    line_item_id: item.id,
                    fee_type: item.fee_type,
                    amount: input.amount,
                    method: input.method,
                    reference: input.reference.clone(),
                    remarks: input.remarks.clone(),
                    recorded_by: actor.to_string(),
                },
            };

            let committed =
                store::call(&self.policy, "commit_payment", self.fees.commit_payment(commit))
                    .await?;

            if let Some(receipt) = committed {
                info!(
                    transaction_id = %receipt.transaction.id,
                    outstanding = %receipt.line_item.outstanding_amount,
                    "Payment recorded"
                );
                self.log(
                    actor,
                    ActivityAction::Payment,
                    format!(
                        "Received {} by {} towards {} for student {}",
                        receipt.transaction.amount,
                        receipt.transaction.method,
                        receipt.line_item.fee_type.label(),
                        receipt.line_item.student_id
                    ),
                )
                .await;
                return Ok(receipt);
            }

            self.retry_or_give_up(input.line_item_id, attempts)?;
        }
    }

    /// Replaces the charges of a line item. Paid amount is preserved.
    ///
    /// # Errors
    ///
    /// `Validation` for negative charges or charges below what was paid,
    /// `FeeCarriedForward` for a closed item.
    #[instrument(skip(self, edit))]
    pub async fn edit_fee_assignment(
        &self,
        line_item_id: FeeLineItemId,
        edit: FeeEdit,
        actor: &str,
    ) -> Result<FeeLineItem, LedgerError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let item = self.open_line_item(line_item_id).await?;
            let balance = item
                .balance()
                .with_charges(edit.total_amount, edit.previous_year_fees)?;

            let patch = FeeLineItemPatch {
                expected_version: item.version,
                balance,
            };
            let updated = store::call(
                &self.policy,
                "update_fee_line_item",
                self.fees.update_fee_line_item(line_item_id, patch),
            )
            .await?;

            if let Some(updated) = updated {
                info!(outstanding = %updated.outstanding_amount, "Fee assignment edited");
                self.log(
                    actor,
                    ActivityAction::Update,
                    format!(
                        "Changed {} for student {} from {}/{} to {}/{}",
                        item.fee_type.label(),
                        item.student_id,
                        item.total_amount,
                        item.previous_year_fees,
                        updated.total_amount,
                        updated.previous_year_fees
                    ),
                )
                .await;
                return Ok(updated);
            }

            self.retry_or_give_up(line_item_id, attempts)?;
        }
    }

    /// Deletes a line item nobody has paid against.
    ///
    /// # Errors
    ///
    /// `CannotRemovePaidFee` once any payment has been recorded.
    #[instrument(skip(self))]
    pub async fn remove_fee_assignment(
        &self,
        line_item_id: FeeLineItemId,
        actor: &str,
    ) -> Result<(), LedgerError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let item = self.open_line_item(line_item_id).await?;
            if item.paid_amount > Decimal::ZERO {
                return Err(LedgerError::CannotRemovePaidFee(line_item_id));
            }

            let deleted = store::call(
                &self.policy,
                "delete_fee_line_item",
                self.fees.delete_fee_line_item(line_item_id, item.version),
            )
            .await?;

            if deleted {
                info!("Fee assignment removed");
                self.log(
                    actor,
                    ActivityAction::Delete,
                    format!(
                        "Removed {} for student {}",
                        item.fee_type.label(),
                        item.student_id
                    ),
                )
                .await;
                return Ok(());
            }

            self.retry_or_give_up(line_item_id, attempts)?;
        }
    }

    /// Totals across a student's line items, optionally for one session.
    pub async fn fee_summary(
        &self,
        student_id: StudentId,
        session_id: Option<AcademicSessionId>,
    ) -> Result<FeeSummary, LedgerError> {
        let items = self.line_items(student_id, session_id).await?;
        Ok(compute_fee_summary(&items))
    }

    /// A student's full account for one session.
    pub async fn student_ledger(
        &self,
        student_id: StudentId,
        session_id: AcademicSessionId,
    ) -> Result<StudentLedger, LedgerError> {
        let line_items = self.line_items(student_id, Some(session_id)).await?;
        let transactions = self
            .transactions(TransactionFilter {
                student_id: Some(student_id),
                session_id: Some(session_id),
                ..TransactionFilter::default()
            })
            .await?;

        Ok(StudentLedger {
            student_id,
            session_id,
            breakdown: with_canonical_fee_types(&line_items, &CANONICAL_FEE_TYPES),
            summary: compute_fee_summary(&line_items),
            line_items,
            transactions,
        })
    }

    /// Payment history matching the filter.
    pub async fn transactions(
        &self,
        filter: TransactionFilter,
    ) -> Result<Vec<FeeTransaction>, LedgerError> {
        let txs = store::read(&self.policy, "fetch_transactions", || {
            self.fees.fetch_transactions(filter.clone())
        })
        .await?;
        Ok(txs)
    }

    async fn line_item(&self, id: FeeLineItemId) -> Result<FeeLineItem, LedgerError> {
        store::read(&self.policy, "fetch_fee_line_item", || {
            self.fees.fetch_fee_line_item(id)
        })
        .await?
        .ok_or(LedgerError::FeeLineItemNotFound(id))
    }

    /// A line item that still accepts payments and edits.
    async fn open_line_item(&self, id: FeeLineItemId) -> Result<FeeLineItem, LedgerError> {
        let item = self.line_item(id).await?;
        if item.is_carried_forward() {
            return Err(LedgerError::FeeCarriedForward(id));
        }
        Ok(item)
    }

    async fn line_items(
        &self,
        student_id: StudentId,
        session_id: Option<AcademicSessionId>,
    ) -> Result<Vec<FeeLineItem>, LedgerError> {
        let items = store::read(&self.policy, "fetch_fee_line_items", || {
            self.fees.fetch_fee_line_items(student_id, session_id)
        })
        .await?;
        Ok(items)
    }

    fn retry_or_give_up(
        &self,
        line_item_id: FeeLineItemId,
        attempts: u32,
    ) -> Result<(), LedgerError> {
        if attempts > self.policy.cas_retries {
            warn!(%line_item_id, attempts, "Giving up after repeated version conflicts");
            return Err(LedgerError::ConcurrentModification {
                line_item_id,
                attempts,
            });
        }
        warn!(%line_item_id, attempts, "Version conflict, re-reading line item");
        Ok(())
    }

    async fn log(&self, actor: &str, action: ActivityAction, description: String) {
        audit::record(
            &self.audit,
            &self.policy,
            NewActivityLog::new(actor, action, MODULE, description),
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MockActivitySink;
    use crate::ledger::types::{FeeType, PaymentMethod};
    use crate::store::PersistenceError;
    use crate::testing::{MemoryStore, fast_policy};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn service(store: &MemoryStore) -> LedgerService<MemoryStore, MemoryStore> {
        LedgerService::new(store.clone(), store.clone(), fast_policy())
    }

    async fn seeded(store: &MemoryStore, total: Decimal, previous: Decimal) -> FeeLineItem {
        let (student, session) = store.seed_student_and_session();
        service(store)
            .add_fee_assignment(
                FeeAssignment {
                    student_id: student.id,
                    session_id: session.id,
                    fee_type: FeeType::Tuition,
                    total_amount: total,
                    previous_year_fees: previous,
                },
                "admin",
            )
            .await
            .unwrap()
    }

    fn payment(item: &FeeLineItem, amount: Decimal) -> PaymentInput {
        PaymentInput {
            line_item_id: item.id,
            amount,
            method: PaymentMethod::Cash,
            reference: None,
            remarks: None,
        }
    }

    #[tokio::test]
    async fn test_add_fee_assignment_opens_balance() {
        let store = MemoryStore::default();
        let item = seeded(&store, dec!(5000), dec!(750)).await;

        assert_eq!(item.outstanding_amount, dec!(5750));
        assert_eq!(item.paid_amount, Decimal::ZERO);
        assert_eq!(item.version, 1);
        assert_eq!(store.activity_count(), 1);
    }

    #[tokio::test]
    async fn test_add_fee_assignment_rejects_duplicate_fee_type() {
        let store = MemoryStore::default();
        let item = seeded(&store, dec!(5000), Decimal::ZERO).await;

        let err = service(&store)
            .add_fee_assignment(
                FeeAssignment {
                    student_id: item.student_id,
                    session_id: item.session_id,
                    fee_type: FeeType::Tuition,
                    total_amount: dec!(100),
                    previous_year_fees: Decimal::ZERO,
                },
                "admin",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(store.line_item_count(), 1);
    }

    #[tokio::test]
    async fn test_partial_payment_then_overpayment() {
        let store = MemoryStore::default();
        let svc = service(&store);
        let item = seeded(&store, dec!(5000), Decimal::ZERO).await;

        let receipt = svc.record_payment(payment(&item, dec!(1000)), "clerk").await.unwrap();
        assert_eq!(receipt.line_item.paid_amount, dec!(1000));
        assert_eq!(receipt.line_item.outstanding_amount, dec!(4000));
        assert_eq!(receipt.transaction.amount, dec!(1000));
        assert_eq!(receipt.transaction.recorded_by, "clerk");

        let err = svc
            .record_payment(payment(&item, dec!(4000.01)), "clerk")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidPaymentAmount { .. }));

        let after = store.line_item(item.id).unwrap();
        assert_eq!(after.outstanding_amount, dec!(4000));
        assert_eq!(store.transaction_count(), 1);
    }

    #[tokio::test]
    async fn test_non_positive_payment_writes_nothing() {
        let store = MemoryStore::default();
        let svc = service(&store);
        let item = seeded(&store, dec!(500), Decimal::ZERO).await;

        for amount in [Decimal::ZERO, dec!(-50)] {
            let err = svc.record_payment(payment(&item, amount), "clerk").await.unwrap_err();
            assert!(matches!(err, LedgerError::InvalidPaymentAmount { .. }));
        }
        assert_eq!(store.transaction_count(), 0);
        assert_eq!(store.line_item(item.id).unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_payment_retries_after_version_conflict() {
        let store = MemoryStore::default();
        let item = seeded(&store, dec!(5000), Decimal::ZERO).await;
        store.inject_cas_conflicts(2);

        let receipt = service(&store)
            .record_payment(payment(&item, dec!(500)), "clerk")
            .await
            .unwrap();
        assert_eq!(receipt.line_item.outstanding_amount, dec!(4500));
        assert_eq!(store.transaction_count(), 1);
    }

    #[tokio::test]
    async fn test_payment_gives_up_after_retry_budget() {
        let store = MemoryStore::default();
        let item = seeded(&store, dec!(5000), Decimal::ZERO).await;
        store.inject_cas_conflicts(10);

        let err = service(&store)
            .record_payment(payment(&item, dec!(500)), "clerk")
            .await
            .unwrap_err();
        match &err {
            LedgerError::ConcurrentModification { attempts, .. } => assert_eq!(*attempts, 4),
            other => panic!("expected ConcurrentModification, got {other:?}"),
        }
        assert!(err.is_retryable());
        assert_eq!(store.transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_payments_never_overdraw() {
        let store = MemoryStore::default();
        let item = seeded(&store, dec!(1000), Decimal::ZERO).await;
        let svc = Arc::new(service(&store));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let svc = Arc::clone(&svc);
            let input = payment(&item, dec!(300));
            handles.push(tokio::spawn(async move { svc.record_payment(input, "clerk").await }));
        }

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                succeeded += 1;
            }
        }

        let after = store.line_item(item.id).unwrap();
        assert!(succeeded <= 3);
        assert_eq!(after.paid_amount, dec!(300) * Decimal::from(succeeded));
        assert!(after.balance().is_reconciled());
        assert_eq!(store.transaction_count(), succeeded);
    }

    #[tokio::test]
    async fn test_edit_keeps_paid_amount() {
        let store = MemoryStore::default();
        let svc = service(&store);
        let item = seeded(&store, dec!(5000), Decimal::ZERO).await;
        svc.record_payment(payment(&item, dec!(2000)), "clerk").await.unwrap();

        let edited = svc
            .edit_fee_assignment(
                item.id,
                FeeEdit {
                    total_amount: dec!(5500),
                    previous_year_fees: dec!(300),
                },
                "admin",
            )
            .await
            .unwrap();
        assert_eq!(edited.paid_amount, dec!(2000));
        assert_eq!(edited.outstanding_amount, dec!(3800));

        let err = svc
            .edit_fee_assignment(
                item.id,
                FeeEdit {
                    total_amount: dec!(1000),
                    previous_year_fees: Decimal::ZERO,
                },
                "admin",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_remove_only_unpaid_fee() {
        let store = MemoryStore::default();
        let svc = service(&store);
        let item = seeded(&store, dec!(800), Decimal::ZERO).await;
        svc.record_payment(payment(&item, dec!(100)), "clerk").await.unwrap();

        let err = svc.remove_fee_assignment(item.id, "admin").await.unwrap_err();
        assert!(matches!(err, LedgerError::CannotRemovePaidFee(_)));

        let other = svc
            .add_fee_assignment(
                FeeAssignment {
                    student_id: item.student_id,
                    session_id: item.session_id,
                    fee_type: FeeType::Sports,
                    total_amount: dec!(400),
                    previous_year_fees: Decimal::ZERO,
                },
                "admin",
            )
            .await
            .unwrap();
        svc.remove_fee_assignment(other.id, "admin").await.unwrap();
        assert!(store.line_item(other.id).is_none());
    }

    #[tokio::test]
    async fn test_missing_line_item() {
        let store = MemoryStore::default();
        let err = service(&store)
            .record_payment(
                PaymentInput {
                    line_item_id: FeeLineItemId::new(),
                    amount: dec!(10),
                    method: PaymentMethod::Upi,
                    reference: None,
                    remarks: None,
                },
                "clerk",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::FeeLineItemNotFound(_)));
    }

    #[tokio::test]
    async fn test_student_ledger_pads_canonical_types() {
        let store = MemoryStore::default();
        let svc = service(&store);
        let item = seeded(&store, dec!(5000), Decimal::ZERO).await;
        svc.record_payment(payment(&item, dec!(1000)), "clerk").await.unwrap();

        let ledger = svc.student_ledger(item.student_id, item.session_id).await.unwrap();
        assert_eq!(ledger.breakdown.len(), CANONICAL_FEE_TYPES.len());
        assert_eq!(ledger.summary.outstanding_amount, dec!(4000));
        assert_eq!(ledger.transactions.len(), 1);
    }

    #[tokio::test]
    async fn test_failing_audit_sink_does_not_fail_payment() {
        let store = MemoryStore::default();
        let item = seeded(&store, dec!(500), Decimal::ZERO).await;

        let mut sink = MockActivitySink::new();
        sink.expect_record()
            .times(1)
            .returning(|_| Err(PersistenceError::store("record_activity", "disk full")));

        let svc = LedgerService::new(store.clone(), sink, fast_policy());
        let receipt = svc.record_payment(payment(&item, dec!(200)), "clerk").await.unwrap();
        assert_eq!(receipt.line_item.outstanding_amount, dec!(300));
    }

    #[tokio::test]
    async fn test_store_failure_on_commit_is_not_retried() {
        let store = MemoryStore::default();
        let item = seeded(&store, dec!(500), Decimal::ZERO).await;
        store.fail_next_commit();

        let err = service(&store)
            .record_payment(payment(&item, dec!(200)), "clerk")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Persistence(_)));
        assert_eq!(store.transaction_count(), 0);
        assert_eq!(store.line_item(item.id).unwrap().paid_amount, Decimal::ZERO);
    }
}
