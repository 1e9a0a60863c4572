//! Session repository port.
//!
//! Keyed, versioned storage for intake sessions.
//!
//! # Design
//!
//! - **Atomic get-or-create**: two first turns racing on one key end up with one session
//! - **Optimistic concurrency**: `update` only succeeds against the version that was read

use crate::domain::foundation::{Channel, DomainError, SessionId, SessionKey, Timestamp};
use crate::domain::intake::IntakeSession;
use async_trait::async_trait;

/// Result of `get_or_create`.
#[derive(Debug, Clone)]
pub struct SessionLoad {
    pub session: IntakeSession,
    /// True when the candidate was inserted by this call.
    pub created: bool,
}

/// Repository port for intake sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Returns the session for the candidate's `(channel, session_key)`,
    /// inserting the candidate if none exists yet.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure
    async fn get_or_create(&self, candidate: IntakeSession) -> Result<SessionLoad, DomainError>;

    /// Writes the session if the stored version still matches, then advances
    /// the session's version.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` if the session doesn't exist
    /// - `ConcurrentModification` if another writer got there first
    /// - `DatabaseError` on persistence failure
    async fn update(&self, session: &mut IntakeSession) -> Result<(), DomainError>;

    /// Find a session by its ID.
    async fn find_by_id(&self, id: &SessionId) -> Result<Option<IntakeSession>, DomainError>;

    /// Find a session by its transport key.
    async fn find_by_key(
        &self,
        channel: Channel,
        key: &SessionKey,
    ) -> Result<Option<IntakeSession>, DomainError>;

    /// Open sessions whose last update is older than `cutoff`, oldest first.
    async fn find_open_idle_since(&self, cutoff: &Timestamp) -> Result<Vec<IntakeSession>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn SessionRepository) {}
    }
}
