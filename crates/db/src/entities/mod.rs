//! `SeaORM` entity definitions.
//!
//! Hand-written to match the SQL in `migration`.

pub mod academic_sessions;
pub mod activity_logs;
pub mod class_fee_structures;
pub mod enrollments;
pub mod expenses;
pub mod fee_line_items;
pub mod fee_transactions;
pub mod students;

pub mod prelude {
    //! Entity re-exports.
    pub use super::academic_sessions::Entity as AcademicSessions;
    pub use super::activity_logs::Entity as ActivityLogs;
    pub use super::class_fee_structures::Entity as ClassFeeStructures;
    pub use super::enrollments::Entity as Enrollments;
    pub use super::expenses::Entity as Expenses;
    pub use super::fee_line_items::Entity as FeeLineItems;
    pub use super::fee_transactions::Entity as FeeTransactions;
    pub use super::students::Entity as Students;
}
