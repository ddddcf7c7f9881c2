use chrono::{DateTime, Utc};
use kosh_shared::types::{AcademicSessionId, ClassFeeStructureId, EnrollmentId, StudentId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Class grades offered by the school, lowest first.
pub const CLASS_GRADES: [&str; 15] = [
    "Nur.", "L.K.G.", "U.K.G.", "1st", "2nd", "3rd", "4th", "5th", "6th", "7th", "8th", "9th",
    "10th", "11th", "12th",
];

/// Returns true if `class_grade` is one of [`CLASS_GRADES`].
#[must_use]
pub fn is_known_class(class_grade: &str) -> bool {
    CLASS_GRADES.contains(&class_grade)
}

/// Whether a student is still on the rolls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    /// Currently studying.
    Active,
    /// Left the school; kept for history.
    Inactive,
}

impl StudentStatus {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    /// Parses the storage representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

/// Student identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Student {
    /// Student ID.
    pub id: StudentId,
    /// School-issued scholar number, unique.
    pub scholar_no: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Parent or guardian.
    pub parent_name: String,
    /// Parent phone.
    pub parent_phone: String,
    /// Parent email.
    pub parent_email: Option<String>,
    /// Active or not.
    pub status: StudentStatus,
    /// When the student was registered.
    pub created_at: DateTime<Utc>,
}

impl Student {
    /// First and last name joined.
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.last_name.is_empty() {
            self.first_name.clone()
        } else {
            format!("{} {}", self.first_name, self.last_name)
        }
    }
}

/// Fields of a student to register.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewStudent {
    /// School-issued scholar number.
    pub scholar_no: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    #[serde(default)]
    pub last_name: String,
    /// Parent or guardian.
    pub parent_name: String,
    /// Parent phone.
    pub parent_phone: String,
    /// Parent email.
    #[serde(default)]
    pub parent_email: Option<String>,
}

/// A student's place in one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Enrollment {
    /// Enrollment ID.
    pub id: EnrollmentId,
    /// Student.
    pub student_id: StudentId,
    /// Session.
    pub session_id: AcademicSessionId,
    /// Class grade, one of [`CLASS_GRADES`].
    pub class_grade: String,
    /// Section letter.
    pub section: Option<String>,
    /// When the enrollment was created.
    pub created_at: DateTime<Utc>,
}

/// Enrollment to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEnrollment {
    /// Student.
    pub student_id: StudentId,
    /// Session.
    pub session_id: AcademicSessionId,
    /// Class grade.
    pub class_grade: String,
    /// Section letter.
    pub section: Option<String>,
}

/// Yearly fee schedule of a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassFeeStructure {
    /// Structure ID.
    pub id: ClassFeeStructureId,
    /// Class grade.
    pub class_grade: String,
    /// Tuition for a full year.
    pub tuition_fee_yearly: Decimal,
    /// Only active structures are used for billing.
    pub is_active: bool,
}
