//! Academic sessions and the single-active-session rule.

mod service;
mod types;

pub use service::SessionService;
pub use types::{AcademicSession, validate_session_name};
