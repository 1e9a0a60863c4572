//! ConfirmationController - resolves read-back confirmations.
//!
//! While a confirmation is pending every turn is a reply to it. Replies are
//! classified on whole words, so "incorrect" never reads as "correct".

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::lead::LeadField;

use super::session::{CandidateSource, IntakeSession, PendingConfirmation};

/// Attempts allowed before an unclear confirmation is treated as a rejection.
pub const DEFAULT_MAX_CONFIRMATION_ATTEMPTS: u32 = 3;

const AFFIRMATIVE_WORDS: &[&str] = &["yes", "yeah", "yep", "yup", "correct", "right", "sure", "okay", "ok"];
const NEGATIVE_WORDS: &[&str] = &["no", "nope", "wrong", "incorrect", "not"];

/// How a reply to a read-back was understood.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationReply {
    Affirmative,
    Negative,
    Unclear,
}

impl ConfirmationReply {
    /// Classifies a reply. Both kinds of keyword, or neither, is unclear.
    pub fn classify(utterance: &str) -> Self {
        let lowered = utterance.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let affirmative = words.iter().any(|w| AFFIRMATIVE_WORDS.contains(w));
        let negative = words.iter().any(|w| NEGATIVE_WORDS.contains(w));
        match (affirmative, negative) {
            (true, false) => ConfirmationReply::Affirmative,
            (false, true) => ConfirmationReply::Negative,
            _ => ConfirmationReply::Unclear,
        }
    }
}

/// Result of resolving one confirmation turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    /// Value committed.
    Confirmed { field: LeadField, source: CandidateSource },
    /// Value discarded and the field cleared for re-collection.
    Rejected { field: LeadField, forced: bool },
    /// Still pending; the same read-back should be repeated.
    Repeat { pending: PendingConfirmation },
}

#[derive(Debug, Clone, Copy)]
pub struct ConfirmationController {
    max_attempts: u32,
}

impl Default for ConfirmationController {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONFIRMATION_ATTEMPTS)
    }
}

impl ConfirmationController {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Applies a reply to the session's pending confirmation.
    ///
    /// Returns `None` when nothing is pending.
    ///
    /// # Errors
    ///
    /// - `SessionClosed` if the session is closed
    pub fn resolve(
        &self,
        session: &mut IntakeSession,
        utterance: &str,
    ) -> Result<Option<ConfirmationOutcome>, DomainError> {
        if session.pending_confirmation().is_none() {
            return Ok(None);
        }

        let outcome = match ConfirmationReply::classify(utterance) {
            ConfirmationReply::Affirmative => {
                let Some(pending) = session.take_confirmation()? else {
                    return Ok(None);
                };
                let field = pending.field();
                session.commit(pending.candidate)?;
                tracing::info!(
                    session_id = %session.id(),
                    field = %field,
                    "Confirmation accepted"
                );
                ConfirmationOutcome::Confirmed {
                    field,
                    source: pending.source,
                }
            }
            ConfirmationReply::Negative => self.reject(session, false)?,
            ConfirmationReply::Unclear => {
                let attempts = session.record_unclear_reply()?;
                if attempts >= self.max_attempts {
                    self.reject(session, true)?
                } else {
                    match session.pending_confirmation() {
                        Some(pending) => ConfirmationOutcome::Repeat {
                            pending: pending.clone(),
                        },
                        None => return Ok(None),
                    }
                }
            }
        };
        Ok(Some(outcome))
    }

    fn reject(
        &self,
        session: &mut IntakeSession,
        forced: bool,
    ) -> Result<ConfirmationOutcome, DomainError> {
        let Some(pending) = session.take_confirmation()? else {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                "No confirmation is pending",
            ));
        };
        let field = pending.field();
        session.clear_field(field)?;
        tracing::info!(
            session_id = %session.id(),
            field = %field,
            forced,
            "Confirmation rejected, re-collecting field"
        );
        Ok(ConfirmationOutcome::Rejected { field, forced })
    }
}
