//! In-Memory Session Repository
//!
//! Keeps intake sessions in a map guarded by one async lock, which makes
//! get-or-create and the version check atomic. Used in tests and local runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{Channel, DomainError, ErrorCode, SessionId, SessionKey, Timestamp};
use crate::domain::intake::IntakeSession;
use crate::ports::{SessionLoad, SessionRepository};

#[derive(Default)]
struct Tables {
    sessions: HashMap<SessionId, IntakeSession>,
    by_key: HashMap<(Channel, SessionKey), SessionId>,
}

/// In-memory storage for intake sessions.
#[derive(Clone, Default)]
pub struct InMemorySessionRepository {
    tables: Arc<RwLock<Tables>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of stored sessions.
    pub async fn session_count(&self) -> usize {
        self.tables.read().await.sessions.len()
    }

    /// Overwrite a session without a version check (test setup only).
    pub async fn insert_raw(&self, session: IntakeSession) {
        let mut tables = self.tables.write().await;
        tables
            .by_key
            .insert((session.channel(), session.session_key().clone()), *session.id());
        tables.sessions.insert(*session.id(), session);
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn get_or_create(&self, candidate: IntakeSession) -> Result<SessionLoad, DomainError> {
        let mut tables = self.tables.write().await;
        let key = (candidate.channel(), candidate.session_key().clone());

        if let Some(existing) = tables.by_key.get(&key).and_then(|id| tables.sessions.get(id)) {
            return Ok(SessionLoad {
                session: existing.clone(),
                created: false,
            });
        }

        tables.by_key.insert(key, *candidate.id());
        tables.sessions.insert(*candidate.id(), candidate.clone());
        Ok(SessionLoad {
            session: candidate,
            created: true,
        })
    }

    async fn update(&self, session: &mut IntakeSession) -> Result<(), DomainError> {
        let mut tables = self.tables.write().await;
        let stored = tables.sessions.get_mut(session.id()).ok_or_else(|| {
            DomainError::new(
                ErrorCode::SessionNotFound,
                format!("Session not found: {}", session.id()),
            )
        })?;

        if stored.version() != session.version() {
            return Err(DomainError::new(
                ErrorCode::ConcurrentModification,
                format!(
                    "Session {} was modified concurrently (expected version {}, found {})",
                    session.id(),
                    session.version(),
                    stored.version()
                ),
            ));
        }

        session.mark_persisted();
        *stored = session.clone();
        Ok(())
    }

    async fn find_by_id(&self, id: &SessionId) -> Result<Option<IntakeSession>, DomainError> {
        Ok(self.tables.read().await.sessions.get(id).cloned())
    }

    async fn find_by_key(
        &self,
        channel: Channel,
        key: &SessionKey,
    ) -> Result<Option<IntakeSession>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_key
            .get(&(channel, key.clone()))
            .and_then(|id| tables.sessions.get(id))
            .cloned())
    }

    async fn find_open_idle_since(&self, cutoff: &Timestamp) -> Result<Vec<IntakeSession>, DomainError> {
        let tables = self.tables.read().await;
        let mut idle: Vec<IntakeSession> = tables
            .sessions
            .values()
            .filter(|s| s.is_open() && s.updated_at().is_before(cutoff))
            .cloned()
            .collect();
        idle.sort_by_key(|s| *s.updated_at());
        Ok(idle)
    }
}
