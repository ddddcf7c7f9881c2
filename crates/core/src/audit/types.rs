use std::fmt;

use chrono::{DateTime, Utc};
use kosh_shared::types::ActivityLogId;
use serde::{Deserialize, Serialize};

/// What kind of change an entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    /// Something was created.
    Create,
    /// Something was changed.
    Update,
    /// Something was removed or deactivated.
    Delete,
    /// A fee payment was received.
    Payment,
    /// Students were promoted.
    Promotion,
    /// A session was made active.
    Activate,
}

impl ActivityAction {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Payment => "payment",
            Self::Promotion => "promotion",
            Self::Activate => "activate",
        }
    }

    /// Parses the storage representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        [
            Self::Create,
            Self::Update,
            Self::Delete,
            Self::Payment,
            Self::Promotion,
            Self::Activate,
        ]
        .into_iter()
        .find(|a| a.as_str() == s)
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry to append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActivityLog {
    /// Who acted.
    pub actor: String,
    /// Kind of change.
    pub action: ActivityAction,
    /// Area of the system (`fees`, `sessions`, ...).
    pub module: &'static str,
    /// Human readable description.
    pub description: String,
}

impl NewActivityLog {
    /// Creates an entry.
    #[must_use]
    pub fn new(
        actor: &str,
        action: ActivityAction,
        module: &'static str,
        description: String,
    ) -> Self {
        Self {
            actor: actor.to_string(),
            action,
            module,
            description,
        }
    }
}

/// Stored entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityLog {
    /// Entry ID.
    pub id: ActivityLogId,
    /// Who acted.
    pub actor: String,
    /// Kind of change.
    pub action: ActivityAction,
    /// Area of the system.
    pub module: String,
    /// Human readable description.
    pub description: String,
    /// When it happened.
    pub created_at: DateTime<Utc>,
}

/// Filter for activity queries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActivityFilter {
    /// Only this actor.
    #[serde(default)]
    pub actor: Option<String>,
    /// Only this module.
    #[serde(default)]
    pub module: Option<String>,
    /// Only entries at or after.
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    /// Maximum number of entries.
    #[serde(default = "default_limit")]
    pub limit: u64,
}

const fn default_limit() -> u64 {
    100
}

impl Default for ActivityFilter {
    fn default() -> Self {
        Self {
            actor: None,
            module: None,
            since: None,
            limit: default_limit(),
        }
    }
}

impl ActivityFilter {
    /// Returns true if the entry passes every set criterion.
    #[must_use]
    pub fn matches(&self, log: &ActivityLog) -> bool {
        self.actor.as_ref().is_none_or(|a| *a == log.actor)
            && self.module.as_ref().is_none_or(|m| *m == log.module)
            && self.since.is_none_or(|since| log.created_at >= since)
    }
}
