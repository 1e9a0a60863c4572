//! ExpireSessionsHandler - closes sessions nobody has touched for a while.
//!
//! Abandoned sessions are closed without a submission. Each candidate is
//! re-read under its conversation lock so a turn that lands mid-sweep wins.

use std::sync::Arc;
use std::time::Duration;

use super::error::IntakeError;
use crate::application::SessionLocks;
use crate::domain::foundation::{CloseReason, SessionId, Timestamp};
use crate::ports::SessionRepository;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpireSessionsResult {
    pub expired: Vec<SessionId>,
    /// Candidates skipped because they changed during the sweep.
    pub skipped: usize,
}

pub struct ExpireSessionsHandler {
    sessions: Arc<dyn SessionRepository>,
    locks: SessionLocks,
    ttl: Duration,
}

impl ExpireSessionsHandler {
    pub fn new(sessions: Arc<dyn SessionRepository>, locks: SessionLocks, ttl: Duration) -> Self {
        Self {
            sessions,
            locks,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Closes every open session idle since before `now - ttl`.
    pub async fn handle(&self, now: Timestamp) -> Result<ExpireSessionsResult, IntakeError> {
        let cutoff = now.minus(self.ttl);
        let candidates = self.sessions.find_open_idle_since(&cutoff).await?;
        let mut result = ExpireSessionsResult::default();

        for candidate in candidates {
            let _guard = self
                .locks
                .acquire(candidate.channel(), candidate.session_key())
                .await;

            let Some(mut session) = self.sessions.find_by_id(candidate.id()).await? else {
                result.skipped += 1;
                continue;
            };
            if !session.is_open() || !session.updated_at().is_before(&cutoff) {
                result.skipped += 1;
                continue;
            }

            session.close(CloseReason::Abandoned)?;
            match self.sessions.update(&mut session).await {
                Ok(()) => {
                    tracing::info!(
                        session_id = %session.id(),
                        channel = %session.channel(),
                        fields = session.fields().len(),
                        "Abandoned session closed"
                    );
                    result.expired.push(*session.id());
                }
                Err(e) if e.is_concurrent_modification() => {
                    tracing::debug!(session_id = %session.id(), "Session changed during expiry, skipped");
                    result.skipped += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemorySessionRepository;
    use crate::domain::foundation::{Channel, SessionKey};
    use crate::domain::intake::IntakeSession;

    fn handler(repo: &InMemorySessionRepository) -> ExpireSessionsHandler {
        ExpireSessionsHandler::new(
            Arc::new(repo.clone()),
            SessionLocks::new(),
            Duration::from_secs(30 * 60),
        )
    }

    async fn open_session(repo: &InMemorySessionRepository, key: &str) -> SessionId {
        let session = IntakeSession::new(Channel::Text, SessionKey::new(key).unwrap(), None, None);
        let id = *session.id();
        repo.insert_raw(session).await;
        id
    }

    #[tokio::test]
    async fn idle_sessions_are_closed_as_abandoned() {
        let repo = InMemorySessionRepository::new();
        let id = open_session(&repo, "t1").await;

        let later = Timestamp::now().plus_secs(31 * 60);
        let result = handler(&repo).handle(later).await.unwrap();

        assert_eq!(result.expired, vec![id]);
        let session = repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(session.close_reason(), Some(CloseReason::Abandoned));
    }

    #[tokio::test]
    async fn recent_sessions_are_kept() {
        let repo = InMemorySessionRepository::new();
        let id = open_session(&repo, "t1").await;

        let result = handler(&repo).handle(Timestamp::now()).await.unwrap();

        assert!(result.expired.is_empty());
        assert!(repo.find_by_id(&id).await.unwrap().unwrap().is_open());
    }

    #[tokio::test]
    async fn closed_sessions_are_not_touched() {
        let repo = InMemorySessionRepository::new();
        let mut session = IntakeSession::new(Channel::Voice, SessionKey::new("c1").unwrap(), None, None);
        session.close(CloseReason::Completed).unwrap();
        repo.insert_raw(session).await;

        let later = Timestamp::now().plus_secs(2 * 60 * 60);
        let result = handler(&repo).handle(later).await.unwrap();

        assert_eq!(result, ExpireSessionsResult::default());
    }
}
