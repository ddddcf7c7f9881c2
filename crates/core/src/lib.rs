//! Core business logic for Kosh.
//!
//! This crate contains the fee-ledger rules with ZERO web or database
//! dependencies. Persistence is reached through the async store traits in
//! [`store`], which `kosh-db` implements.
//!
//! # Modules
//!
//! - `ledger` - Fee line items, payments, balance reconciliation
//! - `promotion` - Batch promotion across academic sessions with dues carry-forward
//! - `session` - Academic sessions and the single-active-session rule
//! - `enrollment` - Students and their per-session enrollments
//! - `expenses` - Money paid out by the school
//! - `audit` - Best-effort activity log
//! - `reports` - Defaulters, collections, fee and financial overviews
//! - `store` - Persistence contracts and call policy (timeouts, read retries)

pub mod audit;
pub mod enrollment;
pub mod expenses;
pub mod ledger;
pub mod promotion;
pub mod reports;
pub mod session;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use ledger::LedgerError;
pub use store::{PersistenceError, StorePolicy};
