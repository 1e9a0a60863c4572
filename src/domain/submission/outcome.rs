//! SubmissionOutcome - one ledger row per completed session.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{
    Channel, DomainError, ErrorCode, OutcomeId, SessionId, StateMachine, Timestamp,
    ValidationError,
};
use crate::domain::lead::LeadFields;

/// Whether the CRM accepted the lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded,
    Failed,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Succeeded => "succeeded",
            OutcomeStatus::Failed => "failed",
        }
    }
}

impl StateMachine for OutcomeStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        matches!((self, target), (OutcomeStatus::Failed, OutcomeStatus::Succeeded))
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            OutcomeStatus::Failed => vec![OutcomeStatus::Succeeded],
            OutcomeStatus::Succeeded => vec![],
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OutcomeStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "succeeded" => Ok(OutcomeStatus::Succeeded),
            "failed" => Ok(OutcomeStatus::Failed),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown outcome status '{}'", other),
            )),
        }
    }
}

/// Result of submitting one session's lead.
///
/// # Invariants
///
/// - `error_message` is present only while failed
/// - `external_response` is present only once succeeded
/// - A succeeded outcome is never changed again
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    id: OutcomeId,
    session_id: SessionId,
    channel: Channel,
    lead_data: LeadFields,
    status: OutcomeStatus,
    error_message: Option<String>,
    retry_count: u32,
    last_retry_at: Option<Timestamp>,
    external_response: Option<serde_json::Value>,
    created_at: Timestamp,
    resolved_at: Option<Timestamp>,
}

impl SubmissionOutcome {
    /// Records an accepted first attempt.
    pub fn succeeded(
        session_id: SessionId,
        channel: Channel,
        lead_data: LeadFields,
        response: serde_json::Value,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id: OutcomeId::new(),
            session_id,
            channel,
            lead_data,
            status: OutcomeStatus::Succeeded,
            error_message: None,
            retry_count: 0,
            last_retry_at: None,
            external_response: Some(response),
            created_at: now,
            resolved_at: Some(now),
        }
    }

    /// Records a failed first attempt.
    pub fn failed(
        session_id: SessionId,
        channel: Channel,
        lead_data: LeadFields,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            id: OutcomeId::new(),
            session_id,
            channel,
            lead_data,
            status: OutcomeStatus::Failed,
            error_message: Some(error_message.into()),
            retry_count: 0,
            last_retry_at: None,
            external_response: None,
            created_at: Timestamp::now(),
            resolved_at: None,
        }
    }

    /// Reconstitute from persistence (no validation).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: OutcomeId,
        session_id: SessionId,
        channel: Channel,
        lead_data: LeadFields,
        status: OutcomeStatus,
        error_message: Option<String>,
        retry_count: u32,
        last_retry_at: Option<Timestamp>,
        external_response: Option<serde_json::Value>,
        created_at: Timestamp,
        resolved_at: Option<Timestamp>,
    ) -> Self {
        Self {
            id,
            session_id,
            channel,
            lead_data,
            status,
            error_message,
            retry_count,
            last_retry_at,
            external_response,
            created_at,
            resolved_at,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> &OutcomeId {
        &self.id
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn lead_data(&self) -> &LeadFields {
        &self.lead_data
    }

    pub fn status(&self) -> OutcomeStatus {
        self.status
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn last_retry_at(&self) -> Option<&Timestamp> {
        self.last_retry_at.as_ref()
    }

    pub fn external_response(&self) -> Option<&serde_json::Value> {
        self.external_response.as_ref()
    }

    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    pub fn resolved_at(&self) -> Option<&Timestamp> {
        self.resolved_at.as_ref()
    }

    pub fn is_resolved(&self) -> bool {
        self.status == OutcomeStatus::Succeeded
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// A retry went through: flip to succeeded and keep the response.
    ///
    /// # Errors
    ///
    /// - `InvalidStateTransition` if already succeeded
    pub fn record_retry_success(&mut self, response: serde_json::Value) -> Result<(), DomainError> {
        self.ensure_unresolved()?;
        let now = Timestamp::now();
        self.status = OutcomeStatus::Succeeded;
        self.error_message = None;
        self.external_response = Some(response);
        self.retry_count += 1;
        self.last_retry_at = Some(now);
        self.resolved_at = Some(now);
        Ok(())
    }

    /// A retry failed again: keep failed, replace the error text.
    ///
    /// # Errors
    ///
    /// - `InvalidStateTransition` if already succeeded
    pub fn record_retry_failure(&mut self, error_message: impl Into<String>) -> Result<(), DomainError> {
        self.ensure_unresolved()?;
        self.error_message = Some(error_message.into());
        self.retry_count += 1;
        self.last_retry_at = Some(Timestamp::now());
        Ok(())
    }

    fn ensure_unresolved(&self) -> Result<(), DomainError> {
        if self.status.can_transition_to(&OutcomeStatus::Succeeded) {
            Ok(())
        } else {
            Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                "Outcome was already submitted successfully",
            )
            .with_detail("outcome_id", self.id.to_string()))
        }
    }
}

/// Query for succeeded outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutcomeFilter {
    /// Only outcomes resolved at or after this instant.
    pub since: Option<Timestamp>,
    pub channel: Option<Channel>,
}

impl OutcomeFilter {
    pub fn matches(&self, outcome: &SubmissionOutcome) -> bool {
        let channel_ok = self.channel.map_or(true, |c| c == outcome.channel());
        let since_ok = match (&self.since, outcome.resolved_at()) {
            (Some(since), Some(resolved)) => !resolved.is_before(since),
            (Some(_), None) => false,
            (None, _) => true,
        };
        channel_ok && since_ok
    }
}
