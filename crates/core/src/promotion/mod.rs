//! Batch promotion of students into a new academic session.
//!
//! A batch moves through `Idle -> Validating -> Promoting(i) -> Completed`,
//! or stops at `Failed(i)` on the first student that cannot be written.
//! Everything that can be checked up front (fee increase range, class,
//! sessions, source enrollment, duplicate target enrollment) is checked
//! before the first write, so a rejected batch leaves no rows behind.
//! Students are then written one at a time, each in its own transaction:
//! the target enrollment, the new line items, and the closing of every
//! source item whose dues were carried over.

mod carry_forward;
mod coordinator;
mod types;

#[cfg(test)]
mod carry_forward_props;

pub use carry_forward::{
    MAX_FEE_INCREASE_PERCENT, check_fee_increase, close_line_items, fallback_line_items,
    plan_line_items,
};
pub use coordinator::PromotionCoordinator;
pub use types::{
    CarriedLineItem, PromotedStudent, PromotionBatch, PromotionFailure, PromotionPhase,
    PromotionReport, PromotionWrite,
};
