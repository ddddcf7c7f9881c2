//! Fee ledger: line items, payments and balance reconciliation.
//!
//! Every fee line item carries `total`, `previous_year_fees`, `paid`,
//! `carried_forward` and `outstanding`. After any mutation the ledger
//! guarantees `outstanding == total + previous_year_fees - paid - carried_forward`
//! and `outstanding >= 0`. A line item whose dues were carried into a later
//! session is closed: it owes nothing and accepts no payments or edits.
//!
//! - [`balance`] holds the pure arithmetic (payments, edits, summaries)
//! - [`service`] applies it against a [`FeeStore`](crate::store::FeeStore)
//!   with optimistic concurrency

pub mod balance;
pub mod error;
pub mod service;
pub mod types;

#[cfg(test)]
mod balance_props;

pub use balance::{Balance, compute_fee_summary, with_canonical_fee_types};
pub use error::LedgerError;
pub use service::LedgerService;
pub use types::{
    CANONICAL_FEE_TYPES, FeeAssignment, FeeBreakdownRow, FeeEdit, FeeLineItem, FeeLineItemPatch,
    FeeSummary, FeeTransaction, FeeType, NewFeeLineItem, NewFeeTransaction, OutstandingLineItem,
    PaymentCommit, PaymentInput, PaymentMethod, PaymentReceipt, StudentLedger, TransactionFilter,
};
