//! Expense repository.

use async_trait::async_trait;
use chrono::Utc;
use kosh_core::PersistenceError;
use kosh_core::expenses::{Expense, ExpenseCategory, ExpenseFilter, NewExpense};
use kosh_core::store::ExpenseStore;
use kosh_shared::types::{AcademicSessionId, ExpenseId};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use super::{corrupt, db_err, utc};
use crate::entities::expenses;

/// Append-only store for school expenses.
#[derive(Debug, Clone)]
pub struct ExpenseRepository {
    db: DatabaseConnection,
}

impl ExpenseRepository {
    /// Creates a new expense repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn expense_from(op: &'static str, m: expenses::Model) -> Result<Expense, PersistenceError> {
    let category: ExpenseCategory = m
        .category
        .parse()
        .map_err(|_| corrupt(op, format!("unknown category: {}", m.category)))?;
    Ok(Expense {
        id: ExpenseId::from_uuid(m.id),
        title: m.title,
        category,
        amount: m.amount,
        expense_date: m.expense_date,
        description: m.description,
        added_by: m.added_by,
        session_id: m.session_id.map(AcademicSessionId::from_uuid),
        created_at: utc(m.created_at),
    })
}

#[async_trait]
impl ExpenseStore for ExpenseRepository {
    async fn insert_expense(&self, expense: NewExpense) -> Result<Expense, PersistenceError> {
        const OP: &str = "insert_expense";
        let model = expenses::ActiveModel {
            id: Set(ExpenseId::new().into_inner()),
            title: Set(expense.title),
            category: Set(expense.category.as_str().to_string()),
            amount: Set(expense.amount),
            expense_date: Set(expense.expense_date),
            description: Set(expense.description),
            added_by: Set(expense.added_by),
            session_id: Set(expense.session_id.map(AcademicSessionId::into_inner)),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.db)
        .await
        .map_err(db_err(OP))?;

        expense_from(OP, model)
    }

    async fn fetch_expenses(
        &self,
        filter: ExpenseFilter,
    ) -> Result<Vec<Expense>, PersistenceError> {
        const OP: &str = "fetch_expenses";
        let mut query = expenses::Entity::find();
        if let Some(id) = filter.session_id {
            query = query.filter(expenses::Column::SessionId.eq(id.into_inner()));
        }
        if let Some(category) = filter.category {
            query = query.filter(expenses::Column::Category.eq(category.as_str()));
        }
        if let Some(from) = filter.from {
            query = query.filter(expenses::Column::ExpenseDate.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(expenses::Column::ExpenseDate.lte(to));
        }

        let rows = query
            .order_by_desc(expenses::Column::ExpenseDate)
            .order_by_desc(expenses::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err(OP))?;

        // Title/description search runs on the decoded rows.
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let expense = expense_from(OP, row)?;
            if filter.matches(&expense) {
                out.push(expense);
            }
        }
        Ok(out)
    }
}
