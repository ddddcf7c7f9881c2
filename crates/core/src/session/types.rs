use chrono::{DateTime, Utc};
use kosh_shared::types::AcademicSessionId;
use serde::Serialize;

use crate::ledger::LedgerError;

/// A school year such as `2025-26`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcademicSession {
    /// Session ID.
    pub id: AcademicSessionId,
    /// Display name, `YYYY-YY`.
    pub name: String,
    /// At most one session is active at a time.
    pub is_active: bool,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
}

/// Checks that `name` is `YYYY-YY` with consecutive years and returns it trimmed.
///
/// # Errors
///
/// `Validation` for anything else, e.g. `2025-27` or `25-26`.
pub fn validate_session_name(name: &str) -> Result<String, LedgerError> {
    let name = name.trim();
    let invalid = || {
        LedgerError::Validation(format!(
            "Session name must look like 2025-26 (consecutive years), got {name:?}"
        ))
    };

    let (start, end) = name.split_once('-').ok_or_else(invalid)?;
    if start.len() != 4
        || end.len() != 2
        || !start.bytes().all(|b| b.is_ascii_digit())
        || !end.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }

    let start: u32 = start.parse().map_err(|_| invalid())?;
    let end: u32 = end.parse().map_err(|_| invalid())?;
    if (start + 1) % 100 != end {
        return Err(invalid());
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("2025-26")]
    #[case(" 2024-25 ")]
    #[case("2099-00")]
    fn test_valid_names(#[case] name: &str) {
        assert_eq!(validate_session_name(name).unwrap(), name.trim());
    }

    #[rstest]
    #[case("2025-27")]
    #[case("25-26")]
    #[case("2025/26")]
    #[case("2025-2026")]
    #[case("abcd-ef")]
    #[case("")]
    fn test_invalid_names(#[case] name: &str) {
        assert!(matches!(
            validate_session_name(name),
            Err(LedgerError::Validation(_))
        ));
    }
}
