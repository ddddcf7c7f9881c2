//! School expenses: money paid out, the counterpart of fee collections.
//!
//! Expenses are append-only. They feed the financial overview in
//! [`crate::reports`], which nets them against fees collected.

mod service;
mod types;

pub use service::ExpenseService;
pub use types::{Expense, ExpenseCategory, ExpenseFilter, ExpenseInput, ExpenseList, NewExpense};
