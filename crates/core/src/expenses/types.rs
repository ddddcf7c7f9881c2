//! Expense types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use kosh_shared::types::{AcademicSessionId, ExpenseId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::LedgerError;

/// What the money was spent on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    /// Bus fuel, repairs and drivers' allowances.
    Transport,
    /// Staff salaries.
    Salary,
    /// Loan instalments.
    Emi,
    /// Day-to-day running costs.
    SchoolExpense,
    /// Building work.
    Construction,
    /// Upkeep and repairs.
    Maintenance,
    /// Anything else.
    Other,
}

impl ExpenseCategory {
    /// Every category, in display order.
    pub const ALL: [Self; 7] = [
        Self::Transport,
        Self::Salary,
        Self::Emi,
        Self::SchoolExpense,
        Self::Construction,
        Self::Maintenance,
        Self::Other,
    ];

    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Salary => "salary",
            Self::Emi => "emi",
            Self::SchoolExpense => "school_expense",
            Self::Construction => "construction",
            Self::Maintenance => "maintenance",
            Self::Other => "other",
        }
    }

    /// Label shown in the expense register.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Transport => "Transport",
            Self::Salary => "Salary",
            Self::Emi => "EMI",
            Self::SchoolExpense => "School Expense",
            Self::Construction => "Construction",
            Self::Maintenance => "Maintenance",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpenseCategory {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| LedgerError::Validation(format!("Unknown expense category: {s}")))
    }
}

/// Money paid out by the school.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    /// Expense ID.
    pub id: ExpenseId,
    /// Short title, e.g. "Diesel for bus 2".
    pub title: String,
    /// Category.
    pub category: ExpenseCategory,
    /// Amount paid out.
    pub amount: Decimal,
    /// Day the money went out.
    pub expense_date: NaiveDate,
    /// Free-form details.
    pub description: Option<String>,
    /// Who entered it.
    pub added_by: String,
    /// Session it was booked against, if one was active.
    pub session_id: Option<AcademicSessionId>,
    /// When it was entered.
    pub created_at: DateTime<Utc>,
}

/// Expense as entered at the counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseInput {
    /// Short title.
    pub title: String,
    /// Category.
    pub category: ExpenseCategory,
    /// Amount, must be positive.
    pub amount: Decimal,
    /// Day the money went out.
    pub expense_date: NaiveDate,
    /// Free-form details.
    pub description: Option<String>,
    /// Session to book against; the active session when absent.
    pub session_id: Option<AcademicSessionId>,
}

/// Expense row to insert. The store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExpense {
    /// Trimmed title.
    pub title: String,
    /// Category.
    pub category: ExpenseCategory,
    /// Amount.
    pub amount: Decimal,
    /// Day the money went out.
    pub expense_date: NaiveDate,
    /// Trimmed details; `None` when blank.
    pub description: Option<String>,
    /// Who entered it.
    pub added_by: String,
    /// Session booked against.
    pub session_id: Option<AcademicSessionId>,
}

/// Narrows the expense register.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExpenseFilter {
    /// Only this session.
    pub session_id: Option<AcademicSessionId>,
    /// Only this category.
    pub category: Option<ExpenseCategory>,
    /// Spent on or after.
    pub from: Option<NaiveDate>,
    /// Spent on or before.
    pub to: Option<NaiveDate>,
    /// Case-insensitive match on title or description.
    pub search: Option<String>,
}

impl ExpenseFilter {
    /// Returns true if the expense passes every set criterion.
    #[must_use]
    pub fn matches(&self, expense: &Expense) -> bool {
        self.session_id.is_none_or(|id| expense.session_id == Some(id))
            && self.category.is_none_or(|c| c == expense.category)
            && self.from.is_none_or(|from| expense.expense_date >= from)
            && self.to.is_none_or(|to| expense.expense_date <= to)
            && self.search_term().is_none_or(|needle| {
                expense.title.to_lowercase().contains(&needle)
                    || expense
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            })
    }

    /// The trimmed, lowercased search text; `None` when blank.
    #[must_use]
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }
}

/// Expenses matching a filter with their total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpenseList {
    /// Newest first.
    pub expenses: Vec<Expense>,
    /// Sum of `amount` over `expenses`.
    pub total_amount: Decimal,
    /// Number of expenses.
    pub count: usize,
}

impl ExpenseList {
    /// Totals an already filtered list.
    #[must_use]
    pub fn new(expenses: Vec<Expense>) -> Self {
        Self {
            total_amount: expenses.iter().map(|e| e.amount).sum(),
            count: expenses.len(),
            expenses,
        }
    }
}
