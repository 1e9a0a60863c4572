//! Errors surfaced to the transport by intake handlers.
//!
//! Conversation-level problems (bad values, unclear replies, extractor or
//! CRM failures) never show up here; they become prompts or ledger rows.

use thiserror::Error;

use crate::domain::foundation::{Channel, DomainError, ErrorCode, SessionKey, ValidationError};

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] ValidationError),

    #[error("no {channel} session for key {key}")]
    SessionNotFound { channel: Channel, key: SessionKey },

    #[error("persistence failed: {0}")]
    Persistence(#[from] DomainError),
}

impl IntakeError {
    /// The write lost an optimistic-concurrency race; the turn may be retried.
    pub fn is_conflict(&self) -> bool {
        matches!(self, IntakeError::Persistence(e) if e.code == ErrorCode::ConcurrentModification)
    }
}
