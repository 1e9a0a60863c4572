//! IntakeSession aggregate.
//!
//! One session per `(channel, session_key)` conversation. The session holds
//! validated fields only, tracks an optional read-back confirmation, and
//! remembers the last prompt so a repeated or failed turn can re-ask it.
//!
//! # Lifecycle
//!
//! Open on the first inbound turn, closed exactly once: on completion, when
//! the voice agent ends the call, or when it sits idle past the TTL.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    Channel, CloseReason, DomainError, ErrorCode, SessionId, SessionKey, SessionStatus,
    StateMachine, Timestamp,
};
use crate::domain::lead::{LeadField, LeadFields, ValidatedValue};

/// Where a value awaiting confirmation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    /// Said or typed by the user.
    Utterance,
    /// The caller-identity number the transport reported.
    CallerId,
}

/// A validated value being read back to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingConfirmation {
    pub candidate: ValidatedValue,
    pub attempts: u32,
    pub source: CandidateSource,
}

impl PendingConfirmation {
    pub fn new(candidate: ValidatedValue, source: CandidateSource) -> Self {
        Self {
            candidate,
            attempts: 0,
            source,
        }
    }

    pub fn field(&self) -> LeadField {
        self.candidate.field()
    }
}

/// Confirmation sub-dialog state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConfirmationState {
    #[default]
    Idle,
    Pending(PendingConfirmation),
}

/// Intake session aggregate.
///
/// # Invariants
///
/// - `fields` only holds values produced by `Validator::accept`
/// - A closed session is never mutated again
/// - `close_reason` is present iff `status` is closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeSession {
    id: SessionId,
    channel: Channel,
    session_key: SessionKey,
    origin_address: Option<String>,
    destination_address: Option<String>,
    fields: LeadFields,
    confirmation: ConfirmationState,
    queued_confirmations: Vec<PendingConfirmation>,
    last_prompt_field: Option<LeadField>,
    last_prompt: Option<String>,
    last_delivery_id: Option<String>,
    caller_id_offered: bool,
    status: SessionStatus,
    close_reason: Option<CloseReason>,
    version: i64,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl IntakeSession {
    /// Creates a new open session with nothing collected.
    pub fn new(
        channel: Channel,
        session_key: SessionKey,
        origin_address: Option<String>,
        destination_address: Option<String>,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id: SessionId::new(),
            channel,
            session_key,
            origin_address,
            destination_address,
            fields: LeadFields::new(),
            confirmation: ConfirmationState::Idle,
            queued_confirmations: Vec::new(),
            last_prompt_field: None,
            last_prompt: None,
            last_delivery_id: None,
            caller_id_offered: false,
            status: SessionStatus::Open,
            close_reason: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstitute a session from persistence (no validation).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: SessionId,
        channel: Channel,
        session_key: SessionKey,
        origin_address: Option<String>,
        destination_address: Option<String>,
        fields: LeadFields,
        confirmation: ConfirmationState,
        queued_confirmations: Vec<PendingConfirmation>,
        last_prompt_field: Option<LeadField>,
        last_prompt: Option<String>,
        last_delivery_id: Option<String>,
        caller_id_offered: bool,
        status: SessionStatus,
        close_reason: Option<CloseReason>,
        version: i64,
        created_at: Timestamp,
        updated_at: Timestamp,
    ) -> Self {
        Self {
            id,
            channel,
            session_key,
            origin_address,
            destination_address,
            fields,
            confirmation,
            queued_confirmations,
            last_prompt_field,
            last_prompt,
            last_delivery_id,
            caller_id_offered,
            status,
            close_reason,
            version,
            created_at,
            updated_at,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn session_key(&self) -> &SessionKey {
        &self.session_key
    }

    pub fn origin_address(&self) -> Option<&str> {
        self.origin_address.as_deref()
    }

    pub fn destination_address(&self) -> Option<&str> {
        self.destination_address.as_deref()
    }

    pub fn fields(&self) -> &LeadFields {
        &self.fields
    }

    pub fn confirmation(&self) -> &ConfirmationState {
        &self.confirmation
    }

    /// Returns the confirmation awaiting a yes/no, if any.
    pub fn pending_confirmation(&self) -> Option<&PendingConfirmation> {
        match &self.confirmation {
            ConfirmationState::Pending(pending) => Some(pending),
            ConfirmationState::Idle => None,
        }
    }

    pub fn queued_confirmations(&self) -> &[PendingConfirmation] {
        &self.queued_confirmations
    }

    pub fn last_prompt_field(&self) -> Option<LeadField> {
        self.last_prompt_field
    }

    pub fn last_prompt(&self) -> Option<&str> {
        self.last_prompt.as_deref()
    }

    pub fn last_delivery_id(&self) -> Option<&str> {
        self.last_delivery_id.as_deref()
    }

    pub fn caller_id_offered(&self) -> bool {
        self.caller_id_offered
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason
    }

    pub fn is_open(&self) -> bool {
        self.status.is_mutable()
    }

    /// Persisted version this copy was loaded at.
    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    pub fn updated_at(&self) -> &Timestamp {
        &self.updated_at
    }

    /// True when this delivery was already processed.
    pub fn is_duplicate_delivery(&self, delivery_id: &str) -> bool {
        self.last_delivery_id.as_deref() == Some(delivery_id)
    }

    /// True while a confirmation is open or queued for the field.
    pub fn is_awaiting_confirmation(&self, field: LeadField) -> bool {
        self.pending_confirmation().map(|p| p.field()) == Some(field)
            || self.queued_confirmations.iter().any(|p| p.field() == field)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Commits a validated value.
    ///
    /// # Errors
    ///
    /// - `SessionClosed` if the session is closed
    pub fn commit(&mut self, value: ValidatedValue) -> Result<(), DomainError> {
        self.ensure_open()?;
        let field = value.field();
        self.fields.insert(field, value.into_value());
        self.touch();
        Ok(())
    }

    /// Drops a committed value so the field is collected again.
    pub fn clear_field(&mut self, field: LeadField) -> Result<Option<String>, DomainError> {
        self.ensure_open()?;
        let previous = self.fields.remove(field);
        self.touch();
        Ok(previous)
    }

    /// Opens a confirmation, or queues it behind the one already open.
    ///
    /// Returns true if the confirmation was opened immediately.
    pub fn request_confirmation(
        &mut self,
        candidate: ValidatedValue,
        source: CandidateSource,
    ) -> Result<bool, DomainError> {
        self.ensure_open()?;
        let pending = PendingConfirmation::new(candidate, source);
        let opened = match self.confirmation {
            ConfirmationState::Idle => {
                self.confirmation = ConfirmationState::Pending(pending);
                true
            }
            ConfirmationState::Pending(_) => {
                self.queued_confirmations.retain(|q| q.field() != pending.field());
                self.queued_confirmations.push(pending);
                self.queued_confirmations.sort_by_key(|q| q.field());
                false
            }
        };
        self.touch();
        Ok(opened)
    }

    /// Records another unclear reply and returns the new attempt count.
    pub fn record_unclear_reply(&mut self) -> Result<u32, DomainError> {
        self.ensure_open()?;
        let attempts = match &mut self.confirmation {
            ConfirmationState::Pending(pending) => {
                pending.attempts += 1;
                pending.attempts
            }
            ConfirmationState::Idle => {
                return Err(DomainError::new(
                    ErrorCode::InvalidStateTransition,
                    "No confirmation is pending",
                ))
            }
        };
        self.touch();
        Ok(attempts)
    }

    /// Closes the open confirmation and returns it.
    pub fn take_confirmation(&mut self) -> Result<Option<PendingConfirmation>, DomainError> {
        self.ensure_open()?;
        let taken = match std::mem::take(&mut self.confirmation) {
            ConfirmationState::Pending(pending) => Some(pending),
            ConfirmationState::Idle => None,
        };
        self.touch();
        Ok(taken)
    }

    /// Opens the next queued confirmation, if idle and one is queued.
    pub fn open_next_queued(&mut self) -> Result<Option<&PendingConfirmation>, DomainError> {
        self.ensure_open()?;
        if self.pending_confirmation().is_some() || self.queued_confirmations.is_empty() {
            return Ok(self.pending_confirmation());
        }
        let next = self.queued_confirmations.remove(0);
        self.confirmation = ConfirmationState::Pending(next);
        self.touch();
        Ok(self.pending_confirmation())
    }

    /// Remembers what was just asked.
    pub fn record_prompt(&mut self, field: Option<LeadField>, prompt: impl Into<String>) {
        self.last_prompt_field = field;
        self.last_prompt = Some(prompt.into());
        self.touch();
    }

    pub fn record_delivery(&mut self, delivery_id: impl Into<String>) {
        self.last_delivery_id = Some(delivery_id.into());
    }

    pub fn mark_caller_id_offered(&mut self) {
        self.caller_id_offered = true;
    }

    /// Closes the session.
    ///
    /// # Errors
    ///
    /// - `InvalidStateTransition` if already closed
    pub fn close(&mut self, reason: CloseReason) -> Result<(), DomainError> {
        self.status = self.status.transition_to(SessionStatus::Closed).map_err(|_| {
            DomainError::new(ErrorCode::InvalidStateTransition, "Session is already closed")
                .with_detail("session_id", self.id.to_string())
        })?;
        self.close_reason = Some(reason);
        self.confirmation = ConfirmationState::Idle;
        self.queued_confirmations.clear();
        self.touch();
        Ok(())
    }

    /// Advances the version after a successful versioned write.
    pub fn mark_persisted(&mut self) {
        self.version += 1;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Private helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn ensure_open(&self) -> Result<(), DomainError> {
        if self.status.is_mutable() {
            Ok(())
        } else {
            Err(DomainError::new(ErrorCode::SessionClosed, "Cannot modify a closed session")
                .with_detail("session_id", self.id.to_string()))
        }
    }

    fn touch(&mut self) {
        self.updated_at = Timestamp::now();
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn new_session_is_open_and_empty() {
        let session = text_session();
        assert!(session.is_open());
        assert!(session.fields().is_empty());
        assert_eq!(session.pending_confirmation(), None);
        assert_eq!(session.close_reason(), None);
        assert_eq!(session.version(), 0);
    }

    #[test]
    fn commit_stores_value() {
        let mut session = text_session();
        session.commit(accepted(LeadField::FirstName, "John")).unwrap();
        assert_eq!(session.fields().get(LeadField::FirstName), Some("John"));
    }

    #[test]
    fn second_confirmation_is_queued_in_field_order() {
        let mut session = text_session();
        let opened = session
            .request_confirmation(accepted(LeadField::Email, "j@example.com"), CandidateSource::Utterance)
            .unwrap();
        assert!(opened);
        let opened = session
            .request_confirmation(accepted(LeadField::Phone, "(555) 223-4567"), CandidateSource::Utterance)
            .unwrap();
        assert!(!opened);
        assert_eq!(session.pending_confirmation().unwrap().field(), LeadField::Email);
        assert_eq!(session.queued_confirmations().len(), 1);
        assert!(session.is_awaiting_confirmation(LeadField::Phone));
    }

    #[test]
    fn open_next_queued_promotes_when_idle() {
        let mut session = text_session();
        session
            .request_confirmation(accepted(LeadField::Phone, "(555) 223-4567"), CandidateSource::Utterance)
            .unwrap();
        session
            .request_confirmation(accepted(LeadField::Email, "j@example.com"), CandidateSource::Utterance)
            .unwrap();
        session.take_confirmation().unwrap();

        let next = session.open_next_queued().unwrap().cloned();
        assert_eq!(next.map(|p| p.field()), Some(LeadField::Email));
        assert!(session.queued_confirmations().is_empty());
    }

    #[test]
    fn unclear_reply_without_pending_is_an_error() {
        let mut session = text_session();
        let err = session.record_unclear_reply().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
    }

    #[test]
    fn closed_session_rejects_mutation() {
        let mut session = text_session();
        session.close(CloseReason::Completed).unwrap();

        let err = session.commit(accepted(LeadField::FirstName, "John")).unwrap_err();
        assert_eq!(err.code, ErrorCode::SessionClosed);
        assert!(session.fields().is_empty());
    }

    #[test]
    fn close_is_one_way() {
        let mut session = voice_session();
        session.close(CloseReason::CallEnded).unwrap();
        assert_eq!(session.close_reason(), Some(CloseReason::CallEnded));

        let err = session.close(CloseReason::Abandoned).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
        assert_eq!(session.close_reason(), Some(CloseReason::CallEnded));
    }

    #[test]
    fn duplicate_delivery_detected() {
        let mut session = text_session();
        session.record_delivery("SM1");
        assert!(session.is_duplicate_delivery("SM1"));
        assert!(!session.is_duplicate_delivery("SM2"));
    }

    #[test]
    fn confirmation_state_serializes_tagged() {
        let state = ConfirmationState::Pending(PendingConfirmation::new(
            accepted(LeadField::Phone, "(555) 223-4567"),
            CandidateSource::CallerId,
        ));
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["state"], "pending");
        assert_eq!(json["source"], "caller_id");
        let back: ConfirmationState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}
