//! Expense register.

use kosh_shared::types::{MONEY_SCALE, round_money};
use rust_decimal::Decimal;
use tracing::{info, instrument};

use super::types::{Expense, ExpenseFilter, ExpenseInput, ExpenseList, NewExpense};
use crate::audit::{self, ActivityAction, ActivitySink, NewActivityLog};
use crate::ledger::LedgerError;
use crate::store::{self, ExpenseStore, SessionStore, StorePolicy};

const MODULE: &str = "expenses";

/// Records money paid out and lists it back.
pub struct ExpenseService<X, S, A> {
    expenses: X,
    sessions: S,
    audit: A,
    policy: StorePolicy,
}

impl<X: ExpenseStore, S: SessionStore, A: ActivitySink> ExpenseService<X, S, A> {
    /// Creates a service over the given store handles.
    pub const fn new(expenses: X, sessions: S, audit: A, policy: StorePolicy) -> Self {
        Self {
            expenses,
            sessions,
            audit,
            policy,
        }
    }

    /// Records an expense.
    ///
    /// Without an explicit session the expense is booked against the active
    /// session, or against none if no session is active.
    ///
    /// # Errors
    ///
    /// - `Validation` for a blank title, a non-positive amount or more than
    ///   two decimal places
    /// - `SessionNotFound` for an explicit session that does not exist
    #[instrument(skip_all, fields(category = %input.category, amount = %input.amount))]
    pub async fn record_expense(
        &self,
        input: ExpenseInput,
        actor: &str,
    ) -> Result<Expense, LedgerError> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(LedgerError::Validation("Expense title is required".to_string()));
        }
        if input.amount <= Decimal::ZERO {
            return Err(LedgerError::Validation(format!(
                "Expense amount must be greater than zero, got {}",
                input.amount
            )));
        }
        if round_money(input.amount) != input.amount {
            return Err(LedgerError::Validation(format!(
                "Expense amount {} has more than {MONEY_SCALE} decimal places",
                input.amount
            )));
        }

        let session_id = match input.session_id {
            Some(id) => {
                store::read(&self.policy, "fetch_session", || {
                    self.sessions.fetch_session(id)
                })
                .await?
                .ok_or(LedgerError::SessionNotFound(id))?;
                Some(id)
            }
            None => store::read(&self.policy, "fetch_active_session", || {
                self.sessions.fetch_active_session()
            })
            .await?
            .map(|s| s.id),
        };

        let new = NewExpense {
            title: title.to_string(),
            category: input.category,
            amount: input.amount,
            expense_date: input.expense_date,
            description: input
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            added_by: actor.to_string(),
            session_id,
        };
        let expense = store::call(
            &self.policy,
            "insert_expense",
            self.expenses.insert_expense(new),
        )
        .await?;

        info!(expense_id = %expense.id, "Expense recorded");
        audit::record(
            &self.audit,
            &self.policy,
            NewActivityLog::new(
                actor,
                ActivityAction::Create,
                MODULE,
                format!(
                    "Recorded {} expense of {}: {}",
                    expense.category.label(),
                    expense.amount,
                    expense.title
                ),
            ),
        )
        .await;
        Ok(expense)
    }

    /// Expenses matching `filter`, newest first, with their total.
    pub async fn list_expenses(&self, filter: ExpenseFilter) -> Result<ExpenseList, LedgerError> {
        let expenses = store::read(&self.policy, "fetch_expenses", || {
            self.expenses.fetch_expenses(filter.clone())
        })
        .await?;
        Ok(ExpenseList::new(expenses))
    }
}
