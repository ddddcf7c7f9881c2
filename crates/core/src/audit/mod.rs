//! Best-effort activity log.
//!
//! Mutations record who did what. Recording never fails the mutation it
//! describes: a sink error is logged and dropped.

mod types;

pub use types::{ActivityAction, ActivityFilter, ActivityLog, NewActivityLog};

use async_trait::async_trait;
use tracing::warn;

use crate::store::{self, PersistenceError, StorePolicy};

/// Destination for activity log entries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActivitySink: Send + Sync {
    /// Appends an entry.
    async fn record(&self, entry: NewActivityLog) -> Result<(), PersistenceError>;

    /// Entries matching the filter, newest first.
    async fn fetch_activity_logs(
        &self,
        filter: ActivityFilter,
    ) -> Result<Vec<ActivityLog>, PersistenceError>;
}

/// Records an entry, logging and swallowing any failure.
pub async fn record<A: ActivitySink + ?Sized>(
    sink: &A,
    policy: &StorePolicy,
    entry: NewActivityLog,
) {
    let action = entry.action;
    let module = entry.module;
    if let Err(err) = store::call(policy, "record_activity", sink.record(entry)).await {
        warn!(%action, module, error = %err, "Failed to write activity log");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fast_policy;

    #[tokio::test]
    async fn test_record_swallows_sink_errors() {
        let mut sink = MockActivitySink::new();
        sink.expect_record()
            .times(1)
            .returning(|_| Err(PersistenceError::store("record_activity", "refused")));

        record(
            &sink,
            &fast_policy(),
            NewActivityLog::new("admin", ActivityAction::Payment, "fees", "Received 100".into()),
        )
        .await;
    }

    #[tokio::test]
    async fn test_record_passes_entry_through() {
        let mut sink = MockActivitySink::new();
        sink.expect_record()
            .withf(|e| e.actor == "admin" && e.module == "sessions")
            .times(1)
            .returning(|_| Ok(()));

        record(
            &sink,
            &fast_policy(),
            NewActivityLog::new("admin", ActivityAction::Activate, "sessions", "2025-26".into()),
        )
        .await;
    }
}
