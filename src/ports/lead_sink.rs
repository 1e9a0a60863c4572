//! Lead sink port - the downstream CRM that accepts completed leads.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::foundation::{Channel, SessionId};
use crate::domain::lead::LeadFields;

#[async_trait]
pub trait LeadSink: Send + Sync {
    /// Submit a completed lead, returning the CRM's response payload.
    async fn submit(&self, lead: &LeadSubmission) -> Result<serde_json::Value, SubmissionError>;
}

/// Normalized snapshot handed to the sink.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadSubmission {
    pub session_id: SessionId,
    pub channel: Channel,
    pub fields: LeadFields,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("submission timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("CRM rejected the lead with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),
}
