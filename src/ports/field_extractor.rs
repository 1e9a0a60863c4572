//! Field Extractor Port - pulls lead field candidates out of an utterance.
//!
//! The extractor is a black box (an LLM, a rules engine, a test script).
//! It only proposes candidates; normalization and validation happen on our
//! side of the port.
//!
//! # Example
//!
//! ```ignore
//! let result = extractor
//!     .extract(ExtractionRequest::new(Channel::Text, "I'm John Doe")
//!         .with_last_prompt_field(Some(LeadField::FirstName)))
//!     .await?;
//! let candidates = CandidateFields::from_raw(&result.candidates);
//! ```

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::foundation::Channel;
use crate::domain::lead::{LeadField, LeadFields, RawCandidate};

#[async_trait]
pub trait FieldExtractor: Send + Sync {
    async fn extract(&self, request: ExtractionRequest) -> Result<ExtractionResult, ExtractionError>;
}

/// Input for one extraction call.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub channel: Channel,
    pub utterance: String,
    /// Fields already collected, so the extractor can skip them.
    pub known_fields: LeadFields,
    /// The field the previous prompt asked for.
    pub last_prompt_field: Option<LeadField>,
}

impl ExtractionRequest {
    pub fn new(channel: Channel, utterance: impl Into<String>) -> Self {
        Self {
            channel,
            utterance: utterance.into(),
            known_fields: LeadFields::new(),
            last_prompt_field: None,
        }
    }

    pub fn with_known_fields(mut self, fields: LeadFields) -> Self {
        self.known_fields = fields;
        self
    }

    pub fn with_last_prompt_field(mut self, field: Option<LeadField>) -> Self {
        self.last_prompt_field = field;
        self
    }
}

/// Candidates proposed by the extractor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionResult {
    pub candidates: Vec<RawCandidate>,
    /// Optional wording for the next question.
    pub suggested_prompt: Option<String>,
}

impl ExtractionResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_candidate(mut self, field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.candidates.push(RawCandidate::new(field, value));
        self
    }

    pub fn with_suggested_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.suggested_prompt = Some(prompt.into());
        self
    }
}

/// Extraction failures. All of them degrade to "nothing extracted".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("extraction timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u32 },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("extractor unavailable: {message}")]
    Unavailable { message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),
}
