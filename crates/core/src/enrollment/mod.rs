//! Students and their per-session enrollments.
//!
//! A [`Student`] is a session-independent identity. Each school year the
//! student gets one [`Enrollment`] carrying class and section, so promotion
//! never duplicates the student record.

mod service;
mod types;

pub use service::EnrollmentService;
pub use types::{
    CLASS_GRADES, ClassFeeStructure, Enrollment, NewEnrollment, NewStudent, Student, StudentStatus,
    is_known_class,
};
