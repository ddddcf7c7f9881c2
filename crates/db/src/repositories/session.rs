//! Academic session repository.

use async_trait::async_trait;
use chrono::Utc;
use kosh_core::PersistenceError;
use kosh_core::session::AcademicSession;
use kosh_core::store::SessionStore;
use kosh_shared::types::AcademicSessionId;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};

use super::{db_err, utc};
use crate::entities::academic_sessions;

/// Session repository for academic sessions.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    db: DatabaseConnection,
}

impl SessionRepository {
    /// Creates a new session repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn session_from(m: academic_sessions::Model) -> AcademicSession {
    AcademicSession {
        id: AcademicSessionId::from_uuid(m.id),
        name: m.name,
        is_active: m.is_active,
        created_at: utc(m.created_at),
    }
}

#[async_trait]
impl SessionStore for SessionRepository {
    async fn insert_session(&self, name: &str) -> Result<AcademicSession, PersistenceError> {
        let model = academic_sessions::ActiveModel {
            id: Set(AcademicSessionId::new().into_inner()),
            name: Set(name.to_string()),
            is_active: Set(false),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.db)
        .await
        .map_err(db_err("insert_session"))?;

        Ok(session_from(model))
    }

    async fn list_sessions(&self) -> Result<Vec<AcademicSession>, PersistenceError> {
        let models = academic_sessions::Entity::find()
            .order_by_desc(academic_sessions::Column::Name)
            .all(&self.db)
            .await
            .map_err(db_err("list_sessions"))?;

        Ok(models.into_iter().map(session_from).collect())
    }

    async fn fetch_session(
        &self,
        id: AcademicSessionId,
    ) -> Result<Option<AcademicSession>, PersistenceError> {
        let model = academic_sessions::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err("fetch_session"))?;

        Ok(model.map(session_from))
    }

    async fn fetch_active_session(&self) -> Result<Option<AcademicSession>, PersistenceError> {
        let model = academic_sessions::Entity::find()
            .filter(academic_sessions::Column::IsActive.eq(true))
            .one(&self.db)
            .await
            .map_err(db_err("fetch_active_session"))?;

        Ok(model.map(session_from))
    }

    /// Sets `is_active = (id = target)` on every row in one statement.
    ///
    /// The single-active exclusion constraint is deferred, so readers see
    /// either the old active session or the new one and never zero or two.
    async fn activate_session(&self, id: AcademicSessionId) -> Result<bool, PersistenceError> {
        const OP: &str = "activate_session";
        let txn = self.db.begin().await.map_err(db_err(OP))?;

        let exists = academic_sessions::Entity::find_by_id(id.into_inner())
            .one(&txn)
            .await
            .map_err(db_err(OP))?
            .is_some();
        if !exists {
            txn.rollback().await.map_err(db_err(OP))?;
            return Ok(false);
        }

        academic_sessions::Entity::update_many()
            .col_expr(
                academic_sessions::Column::IsActive,
                Expr::col(academic_sessions::Column::Id).eq(id.into_inner()),
            )
            .exec(&txn)
            .await
            .map_err(db_err(OP))?;

        txn.commit().await.map_err(db_err(OP))?;
        Ok(true)
    }
}
