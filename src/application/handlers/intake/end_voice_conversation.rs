//! EndVoiceConversationHandler - the voice agent reports a finished call.
//!
//! The agent has already read values back to the caller, so reported
//! values only pass normalization and validation before filling fields
//! that are still missing. The session closes as `call_ended` either way.
//! Reporting again for a closed, complete call whose outcome was never
//! recorded submits it again.

use std::sync::Arc;

use super::error::IntakeError;
use crate::application::handlers::submission::LeadSubmitter;
use crate::application::SessionLocks;
use crate::domain::foundation::{Channel, CloseReason, SessionId, SessionKey};
use crate::domain::lead::{CandidateFields, LeadField, Normalizer, RawCandidate, Validator};
use crate::domain::submission::SubmissionOutcome;
use crate::ports::SessionRepository;

#[derive(Debug, Clone)]
pub struct EndVoiceConversationCommand {
    /// Call id
    pub session_key: String,
    /// Fields the agent collected, as `(field, value)` pairs.
    pub reported_fields: Vec<RawCandidate>,
}

#[derive(Debug, Clone)]
pub struct EndVoiceConversationResult {
    pub session_id: SessionId,
    /// Fields filled from the report.
    pub filled: Vec<LeadField>,
    /// Every required field was present at close.
    pub complete: bool,
    /// The session had already been closed; nothing changed.
    pub already_closed: bool,
    pub submission: Option<SubmissionOutcome>,
}

pub struct EndVoiceConversationHandler {
    sessions: Arc<dyn SessionRepository>,
    submitter: Arc<LeadSubmitter>,
    locks: SessionLocks,
    normalizer: Normalizer,
    validator: Validator,
}

impl EndVoiceConversationHandler {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        submitter: Arc<LeadSubmitter>,
        locks: SessionLocks,
        reference_year: i32,
    ) -> Self {
        Self {
            sessions,
            submitter,
            locks,
            normalizer: Normalizer::new(reference_year),
            validator: Validator::new(reference_year),
        }
    }

    pub async fn handle(
        &self,
        cmd: EndVoiceConversationCommand,
    ) -> Result<EndVoiceConversationResult, IntakeError> {
        let key = SessionKey::new(cmd.session_key)?;
        let guard = self.locks.acquire(Channel::Voice, &key).await;

        let mut session = self
            .sessions
            .find_by_key(Channel::Voice, &key)
            .await?
            .ok_or_else(|| IntakeError::SessionNotFound {
                channel: Channel::Voice,
                key: key.clone(),
            })?;

        if !session.is_open() {
            drop(guard);
            let complete = session.fields().is_complete();
            let submission = if complete {
                Some(self.submitter.submit(&session).await?)
            } else {
                None
            };
            return Ok(EndVoiceConversationResult {
                session_id: *session.id(),
                filled: Vec::new(),
                complete,
                already_closed: true,
                submission,
            });
        }

        let mut filled = Vec::new();
        for (field, raw) in CandidateFields::from_raw(&cmd.reported_fields).iter() {
            if session.fields().contains(field) {
                continue;
            }
            let value = self.normalizer.normalize(field, raw);
            match self.validator.accept(field, &value) {
                Ok(accepted) => {
                    session.commit(accepted)?;
                    filled.push(field);
                }
                Err(issue) => tracing::warn!(
                    session_id = %session.id(),
                    field = %field,
                    issue = ?issue,
                    "Discarding invalid value reported by voice agent"
                ),
            }
        }

        session.close(CloseReason::CallEnded)?;
        self.sessions.update(&mut session).await?;
        drop(guard);

        let complete = session.fields().is_complete();
        tracing::info!(
            session_id = %session.id(),
            filled = filled.len(),
            complete,
            "Voice conversation ended"
        );

        let submission = if complete {
            Some(self.submitter.submit(&session).await?)
        } else {
            None
        };

        Ok(EndVoiceConversationResult {
            session_id: *session.id(),
            filled,
            complete,
            already_closed: false,
            submission,
        })
    }
}
