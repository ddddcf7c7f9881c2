//! Fee reports.
//!
//! - Defaulters: students who still owe, aggregated across their line items
//! - Collections: payments received, grouped by method and fee type
//! - Session overview: what was billed, paid and owed in a session
//! - Financial overview: fees collected against expenses over a period
//! - Activity log

pub mod service;
pub mod types;


pub use service::ReportService;
pub use types::*;
