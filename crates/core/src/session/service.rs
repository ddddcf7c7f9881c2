//! Session manager.

use kosh_shared::types::AcademicSessionId;
use tracing::{info, instrument};

use super::types::{AcademicSession, validate_session_name};
use crate::audit::{self, ActivityAction, ActivitySink, NewActivityLog};
use crate::ledger::LedgerError;
use crate::store::{self, SessionStore, StorePolicy};

const MODULE: &str = "sessions";

/// Creates sessions and switches the active one.
pub struct SessionService<S, A> {
    sessions: S,
    audit: A,
    policy: StorePolicy,
}

impl<S: SessionStore, A: ActivitySink> SessionService<S, A> {
    /// Creates a service over the given store handles.
    pub const fn new(sessions: S, audit: A, policy: StorePolicy) -> Self {
        Self {
            sessions,
            audit,
            policy,
        }
    }

    /// Creates an inactive session.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed or already used name.
    #[instrument(skip(self))]
    pub async fn create_session(
        &self,
        name: &str,
        actor: &str,
    ) -> Result<AcademicSession, LedgerError> {
        let name = validate_session_name(name)?;
        if self.list_sessions().await?.iter().any(|s| s.name == name) {
            return Err(LedgerError::Validation(format!(
                "Session {name} already exists"
            )));
        }

        let session = store::call(
            &self.policy,
            "insert_session",
            self.sessions.insert_session(&name),
        )
        .await?;

        info!(session_id = %session.id, "Session created");
        self.log(actor, ActivityAction::Create, format!("Created session {name}"))
            .await;
        Ok(session)
    }

    /// All sessions, newest first.
    pub async fn list_sessions(&self) -> Result<Vec<AcademicSession>, LedgerError> {
        let sessions = store::read(&self.policy, "list_sessions", || {
            self.sessions.list_sessions()
        })
        .await?;
        Ok(sessions)
    }

    /// The active session, if any.
    pub async fn active_session(&self) -> Result<Option<AcademicSession>, LedgerError> {
        let session = store::read(&self.policy, "fetch_active_session", || {
            self.sessions.fetch_active_session()
        })
        .await?;
        Ok(session)
    }

    /// A session by id.
    pub async fn session(&self, id: AcademicSessionId) -> Result<AcademicSession, LedgerError> {
        store::read(&self.policy, "fetch_session", || {
            self.sessions.fetch_session(id)
        })
        .await?
        .ok_or(LedgerError::SessionNotFound(id))
    }

    /// Makes `id` the only active session.
    ///
    /// The switch is a single conditional update, so no reader ever sees
    /// zero or two active sessions.
    ///
    /// # Errors
    ///
    /// `SessionNotFound` if `id` does not exist; nothing changes in that case.
    #[instrument(skip(self))]
    pub async fn set_active_session(
        &self,
        id: AcademicSessionId,
        actor: &str,
    ) -> Result<AcademicSession, LedgerError> {
        let session = self.session(id).await?;

        let switched = store::call(
            &self.policy,
            "activate_session",
            self.sessions.activate_session(id),
        )
        .await?;
        if !switched {
            return Err(LedgerError::SessionNotFound(id));
        }

        info!(name = %session.name, "Active session switched");
        self.log(
            actor,
            ActivityAction::Activate,
            format!("Activated session {}", session.name),
        )
        .await;

        Ok(AcademicSession {
            is_active: true,
            ..session
        })
    }

    async fn log(&self, actor: &str, action: ActivityAction, description: String) {
        audit::record(
            &self.audit,
            &self.policy,
            NewActivityLog::new(actor, action, MODULE, description),
        )
        .await;
    }
}
