//! Activity log repository.

use async_trait::async_trait;
use chrono::Utc;
use kosh_core::PersistenceError;
use kosh_core::audit::{ActivityAction, ActivityFilter, ActivityLog, ActivitySink, NewActivityLog};
use kosh_shared::types::ActivityLogId;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

use super::{corrupt, db_err, utc};
use crate::entities::activity_logs;

/// Append-only store for activity log entries.
#[derive(Debug, Clone)]
pub struct ActivityRepository {
    db: DatabaseConnection,
}

impl ActivityRepository {
    /// Creates a new activity repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ActivitySink for ActivityRepository {
    async fn record(&self, entry: NewActivityLog) -> Result<(), PersistenceError> {
        activity_logs::ActiveModel {
            id: Set(ActivityLogId::new().into_inner()),
            actor: Set(entry.actor),
            action: Set(entry.action.as_str().to_string()),
            module: Set(entry.module.to_string()),
            description: Set(entry.description),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.db)
        .await
        .map_err(db_err("record_activity"))?;

        Ok(())
    }

    async fn fetch_activity_logs(
        &self,
        filter: ActivityFilter,
    ) -> Result<Vec<ActivityLog>, PersistenceError> {
        const OP: &str = "fetch_activity_logs";
        let mut query = activity_logs::Entity::find();
        if let Some(actor) = filter.actor {
            query = query.filter(activity_logs::Column::Actor.eq(actor));
        }
        if let Some(module) = filter.module {
            query = query.filter(activity_logs::Column::Module.eq(module));
        }
        if let Some(since) = filter.since {
            query = query.filter(activity_logs::Column::CreatedAt.gte(since));
        }

        query
            .order_by_desc(activity_logs::Column::CreatedAt)
            .limit(filter.limit)
            .all(&self.db)
            .await
            .map_err(db_err(OP))?
            .into_iter()
            .map(|m| {
                let action = ActivityAction::parse(&m.action)
                    .ok_or_else(|| corrupt(OP, format!("unknown action: {}", m.action)))?;
                Ok(ActivityLog {
                    id: ActivityLogId::from_uuid(m.id),
                    actor: m.actor,
                    action,
                    module: m.module,
                    description: m.description,
                    created_at: utc(m.created_at),
                })
            })
            .collect()
    }
}
