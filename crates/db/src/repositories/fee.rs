//! Fee line item and payment repository.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use kosh_core::PersistenceError;
use kosh_core::ledger::{
    Balance, FeeLineItem, FeeLineItemPatch, FeeTransaction, FeeType, NewFeeLineItem,
    OutstandingLineItem, PaymentCommit, PaymentMethod, PaymentReceipt, TransactionFilter,
};
use kosh_core::store::FeeStore;
use kosh_shared::types::{AcademicSessionId, FeeLineItemId, FeeTransactionId, StudentId};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

use super::{corrupt, db_err, utc};
use crate::entities::{enrollments, fee_line_items, fee_transactions, students};

/// Fee repository over `fee_line_items` and `fee_transactions`.
#[derive(Debug, Clone)]
pub struct FeeRepository {
    db: DatabaseConnection,
}

impl FeeRepository {
    /// Creates a new fee repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

pub(crate) fn line_item_from(
    operation: &'static str,
    m: fee_line_items::Model,
) -> Result<FeeLineItem, PersistenceError> {
    let fee_type: FeeType = m.fee_type.parse().map_err(|e| corrupt(operation, e))?;
    Ok(FeeLineItem {
        id: FeeLineItemId::from_uuid(m.id),
        student_id: StudentId::from_uuid(m.student_id),
        session_id: AcademicSessionId::from_uuid(m.session_id),
        fee_type,
        total_amount: m.total_amount,
        previous_year_fees: m.previous_year_fees,
        paid_amount: m.paid_amount,
        carried_forward_amount: m.carried_forward_amount,
        outstanding_amount: m.outstanding_amount,
        version: m.version,
        created_at: utc(m.created_at),
        updated_at: utc(m.updated_at),
    })
}

fn transaction_from(
    operation: &'static str,
    m: fee_transactions::Model,
) -> Result<FeeTransaction, PersistenceError> {
    let fee_type: FeeType = m.fee_type.parse().map_err(|e| corrupt(operation, e))?;
    let method: PaymentMethod = m.method.parse().map_err(|e| corrupt(operation, e))?;
    Ok(FeeTransaction {
        id: FeeTransactionId::from_uuid(m.id),
        student_id: StudentId::from_uuid(m.student_id),
        session_id: AcademicSessionId::from_uuid(m.session_id),
        line_item_id: FeeLineItemId::from_uuid(m.line_item_id),
        fee_type,
        amount: m.amount,
        method,
        reference: m.reference,
        remarks: m.remarks,
        recorded_by: m.recorded_by,
        recorded_at: utc(m.recorded_at),
    })
}

pub(crate) fn new_line_item_model(item: &NewFeeLineItem) -> fee_line_items::ActiveModel {
    let now = Utc::now().into();
    fee_line_items::ActiveModel {
        id: Set(FeeLineItemId::new().into_inner()),
        student_id: Set(item.student_id.into_inner()),
        session_id: Set(item.session_id.into_inner()),
        fee_type: Set(item.fee_type.as_str().to_string()),
        total_amount: Set(item.balance.total_amount),
        previous_year_fees: Set(item.balance.previous_year_fees),
        paid_amount: Set(item.balance.paid_amount),
        carried_forward_amount: Set(item.balance.carried_forward_amount),
        outstanding_amount: Set(item.balance.outstanding_amount),
        version: Set(1),
        created_at: Set(now),
        updated_at: Set(now),
    }
}

/// Versioned update of every balance column. Matches no row when the
/// stored version differs from `expected_version`.
pub(crate) fn versioned_update(
    id: FeeLineItemId,
    expected_version: i64,
    balance: Balance,
) -> sea_orm::UpdateMany<fee_line_items::Entity> {
    use fee_line_items::Column;

    fee_line_items::Entity::update_many()
        .col_expr(Column::TotalAmount, Expr::value(balance.total_amount))
        .col_expr(Column::PreviousYearFees, Expr::value(balance.previous_year_fees))
        .col_expr(Column::PaidAmount, Expr::value(balance.paid_amount))
        .col_expr(Column::CarriedForwardAmount, Expr::value(balance.carried_forward_amount))
        .col_expr(Column::OutstandingAmount, Expr::value(balance.outstanding_amount))
        .col_expr(
            fee_line_items::Column::Version,
            Expr::col(fee_line_items::Column::Version).add(1),
        )
        .col_expr(fee_line_items::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(fee_line_items::Column::Id.eq(id.into_inner()))
        .filter(fee_line_items::Column::Version.eq(expected_version))
}

#[async_trait]
impl FeeStore for FeeRepository {
    async fn fetch_fee_line_items(
        &self,
        student_id: StudentId,
        session_id: Option<AcademicSessionId>,
    ) -> Result<Vec<FeeLineItem>, PersistenceError> {
        const OP: &str = "fetch_fee_line_items";
        let mut query = fee_line_items::Entity::find()
            .filter(fee_line_items::Column::StudentId.eq(student_id.into_inner()));
        if let Some(session_id) = session_id {
            query = query.filter(fee_line_items::Column::SessionId.eq(session_id.into_inner()));
        }
        let models = query
            .order_by_asc(fee_line_items::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err(OP))?;
        models.into_iter().map(|m| line_item_from(OP, m)).collect()
    }

    async fn fetch_session_line_items(
        &self,
        session_id: AcademicSessionId,
    ) -> Result<Vec<FeeLineItem>, PersistenceError> {
        const OP: &str = "fetch_session_line_items";
        let models = fee_line_items::Entity::find()
            .filter(fee_line_items::Column::SessionId.eq(session_id.into_inner()))
            .order_by_asc(fee_line_items::Column::StudentId)
            .order_by_asc(fee_line_items::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err(OP))?;
        models.into_iter().map(|m| line_item_from(OP, m)).collect()
    }

    async fn fetch_fee_line_item(
        &self,
        id: FeeLineItemId,
    ) -> Result<Option<FeeLineItem>, PersistenceError> {
        const OP: &str = "fetch_fee_line_item";
        fee_line_items::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err(OP))?
            .map(|m| line_item_from(OP, m))
            .transpose()
    }

    async fn fetch_outstanding_line_items(
        &self,
        session_id: Option<AcademicSessionId>,
    ) -> Result<Vec<OutstandingLineItem>, PersistenceError> {
        const OP: &str = "fetch_outstanding_line_items";
        let mut query = fee_line_items::Entity::find()
            .filter(fee_line_items::Column::OutstandingAmount.gt(Decimal::ZERO));
        if let Some(session_id) = session_id {
            query = query.filter(fee_line_items::Column::SessionId.eq(session_id.into_inner()));
        }
        let items = query
            .order_by_asc(fee_line_items::Column::StudentId)
            .all(&self.db)
            .await
            .map_err(db_err(OP))?;
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let mut student_ids: Vec<Uuid> = items.iter().map(|i| i.student_id).collect();
        student_ids.dedup();

        let students: HashMap<Uuid, students::Model> = students::Entity::find()
            .filter(students::Column::Id.is_in(student_ids.clone()))
            .all(&self.db)
            .await
            .map_err(db_err(OP))?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

        let classes: HashMap<(Uuid, Uuid), String> = enrollments::Entity::find()
            .filter(enrollments::Column::StudentId.is_in(student_ids))
            .all(&self.db)
            .await
            .map_err(db_err(OP))?
            .into_iter()
            .map(|e| ((e.student_id, e.session_id), e.class_grade))
            .collect();

        items
            .into_iter()
            .map(|m| {
                let student = students
                    .get(&m.student_id)
                    .ok_or_else(|| corrupt(OP, format!("line item {} has no student", m.id)))?;
                let class_grade = classes.get(&(m.student_id, m.session_id)).cloned();
                let student_name = if student.last_name.is_empty() {
                    student.first_name.clone()
                } else {
                    format!("{} {}", student.first_name, student.last_name)
                };
                Ok(OutstandingLineItem {
                    scholar_no: student.scholar_no.clone(),
                    student_name,
                    parent_phone: student.parent_phone.clone(),
                    class_grade,
                    line_item: line_item_from(OP, m)?,
                })
            })
            .collect()
    }

    async fn insert_fee_line_item(
        &self,
        item: NewFeeLineItem,
    ) -> Result<FeeLineItem, PersistenceError> {
        const OP: &str = "insert_fee_line_item";
        let model = new_line_item_model(&item)
            .insert(&self.db)
            .await
            .map_err(db_err(OP))?;
        line_item_from(OP, model)
    }

    async fn update_fee_line_item(
        &self,
        id: FeeLineItemId,
        patch: FeeLineItemPatch,
    ) -> Result<Option<FeeLineItem>, PersistenceError> {
        const OP: &str = "update_fee_line_item";
        let updated = versioned_update(id, patch.expected_version, patch.balance)
            .exec_with_returning(&self.db)
            .await
            .map_err(db_err(OP))?;

        updated
            .into_iter()
            .next()
            .map(|m| line_item_from(OP, m))
            .transpose()
    }

    async fn delete_fee_line_item(
        &self,
        id: FeeLineItemId,
        expected_version: i64,
    ) -> Result<bool, PersistenceError> {
        let result = fee_line_items::Entity::delete_many()
            .filter(fee_line_items::Column::Id.eq(id.into_inner()))
            .filter(fee_line_items::Column::Version.eq(expected_version))
            .exec(&self.db)
            .await
            .map_err(db_err("delete_fee_line_item"))?;

        Ok(result.rows_affected > 0)
    }

    async fn commit_payment(
        &self,
        commit: PaymentCommit,
    ) -> Result<Option<PaymentReceipt>, PersistenceError> {
        const OP: &str = "commit_payment";
        let txn = self.db.begin().await.map_err(db_err(OP))?;

        let updated =
            versioned_update(commit.line_item_id, commit.expected_version, commit.balance)
                .filter(fee_line_items::Column::OutstandingAmount.gte(commit.transaction.amount))
                .filter(fee_line_items::Column::CarriedForwardAmount.eq(Decimal::ZERO))
                .exec_with_returning(&txn)
                .await
                .map_err(db_err(OP))?;

        let Some(line_item) = updated.into_iter().next() else {
            txn.rollback().await.map_err(db_err(OP))?;
            debug!(line_item_id = %commit.line_item_id, "Payment guard matched no row");
            return Ok(None);
        };

        let tx = commit.transaction;
        let transaction = fee_transactions::ActiveModel {
            id: Set(FeeTransactionId::new().into_inner()),
            student_id: Set(tx.student_id.into_inner()),
            session_id: Set(tx.session_id.into_inner()),
            line_item_id: Set(tx.line_item_id.into_inner()),
            fee_type: Set(tx.fee_type.as_str().to_string()),
            amount: Set(tx.amount),
            method: Set(tx.method.as_str().to_string()),
            reference: Set(tx.reference),
            remarks: Set(tx.remarks),
            recorded_by: Set(tx.recorded_by),
            recorded_at: Set(Utc::now().into()),
        }
        .insert(&txn)
        .await
        .map_err(db_err(OP))?;

        txn.commit().await.map_err(db_err(OP))?;

        Ok(Some(PaymentReceipt::new(
            line_item_from(OP, line_item)?,
            transaction_from(OP, transaction)?,
        )))
    }

    async fn fetch_transactions(
        &self,
        filter: TransactionFilter,
    ) -> Result<Vec<FeeTransaction>, PersistenceError> {
        const OP: &str = "fetch_transactions";
        let mut query = fee_transactions::Entity::find();
        if let Some(id) = filter.student_id {
            query = query.filter(fee_transactions::Column::StudentId.eq(id.into_inner()));
        }
        if let Some(id) = filter.session_id {
            query = query.filter(fee_transactions::Column::SessionId.eq(id.into_inner()));
        }
        if let Some(id) = filter.line_item_id {
            query = query.filter(fee_transactions::Column::LineItemId.eq(id.into_inner()));
        }
        if let Some(method) = filter.method {
            query = query.filter(fee_transactions::Column::Method.eq(method.as_str()));
        }
        if let Some(from) = filter.from {
            query = query.filter(fee_transactions::Column::RecordedAt.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(fee_transactions::Column::RecordedAt.lt(to));
        }

        query
            .order_by_desc(fee_transactions::Column::RecordedAt)
            .all(&self.db)
            .await
            .map_err(db_err(OP))?
            .into_iter()
            .map(|m| transaction_from(OP, m))
            .collect()
    }
}
