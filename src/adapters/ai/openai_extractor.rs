//! OpenAI Field Extractor - FieldExtractor backed by chat completions.
//!
//! Asks the model for a JSON object of the form
//! `{"fields": {"first_name": "John", ...}, "next_prompt": "..."}` using
//! the `json_object` response format, then hands the raw pairs back
//! through the port untouched.
//!
//! # Configuration
//!
//! ```ignore
//! let config = OpenAIExtractorConfig::new(api_key)
//!     .with_model("gpt-4o-mini")
//!     .with_timeout(Duration::from_secs(8));
//!
//! let extractor = OpenAIFieldExtractor::new(config)?;
//! ```

use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::foundation::Channel;
use crate::domain::lead::{LeadField, RawCandidate};
use crate::ports::{ExtractionError, ExtractionRequest, ExtractionResult, FieldExtractor};

/// Configuration for the OpenAI extractor.
#[derive(Debug, Clone)]
pub struct OpenAIExtractorConfig {
    api_key: Secret<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl OpenAIExtractorConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::from_secret(Secret::new(api_key.into()))
    }

    pub fn from_secret(api_key: Secret<String>) -> Self {
        Self {
            api_key,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout: Duration::from_secs(8),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

/// Extracts lead fields with an OpenAI chat model.
pub struct OpenAIFieldExtractor {
    config: OpenAIExtractorConfig,
    client: Client,
}

impl OpenAIFieldExtractor {
    pub fn new(config: OpenAIExtractorConfig) -> Result<Self, ExtractionError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ExtractionError::Unavailable {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { config, client })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn to_openai_request(&self, request: &ExtractionRequest) -> OpenAIRequest {
        OpenAIRequest {
            model: self.config.model.clone(),
            messages: vec![
                OpenAIMessage {
                    role: "system".to_string(),
                    content: system_prompt(request.channel),
                },
                OpenAIMessage {
                    role: "user".to_string(),
                    content: user_prompt(request),
                },
            ],
            temperature: 0.0,
            response_format: ResponseFormat {
                kind: "json_object".to_string(),
            },
        }
    }

    async fn send_request(&self, request: &ExtractionRequest) -> Result<Response, ExtractionError> {
        self.client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.config.api_key()))
            .header("Content-Type", "application/json")
            .json(&self.to_openai_request(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExtractionError::Timeout {
                        timeout_ms: self.config.timeout.as_millis() as u64,
                    }
                } else if e.is_connect() {
                    ExtractionError::Network(format!("Connection failed: {}", e))
                } else {
                    ExtractionError::Network(e.to_string())
                }
            })
    }

    async fn handle_response_status(&self, response: Response) -> Result<Response, ExtractionError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_body = response.text().await.unwrap_or_default();
        match status.as_u16() {
            401 | 403 => Err(ExtractionError::AuthenticationFailed),
            429 => Err(ExtractionError::RateLimited {
                retry_after_secs: 30,
            }),
            500..=599 => Err(ExtractionError::Unavailable {
                message: format!("Server error {}: {}", status, error_body),
            }),
            _ => Err(ExtractionError::Network(format!(
                "Unexpected status {}: {}",
                status, error_body
            ))),
        }
    }
}

#[async_trait]
impl FieldExtractor for OpenAIFieldExtractor {
    async fn extract(&self, request: ExtractionRequest) -> Result<ExtractionResult, ExtractionError> {
        let response = self.send_request(&request).await?;
        let response = self.handle_response_status(response).await?;

        let completion: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::Parse(format!("Failed to parse response: {}", e)))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ExtractionError::Parse("No choices in response".to_string()))?;

        parse_extraction(&content)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Prompting
// ════════════════════════════════════════════════════════════════════════════

fn system_prompt(channel: Channel) -> String {
    let keys: Vec<&str> = LeadField::all().iter().map(|f| f.key()).collect();
    let medium = match channel {
        Channel::Text => "an SMS conversation",
        Channel::Voice => "a transcribed phone call, so expect spoken forms like 'john at gmail dot com'",
    };
    format!(
        "You extract lead details from {}. Allowed field keys: {}. \
         Reply with a JSON object {{\"fields\": {{key: value}}, \"next_prompt\": string or null}}. \
         Only include fields the user actually stated in the latest message. \
         Copy values as said; do not correct, format or guess them.",
        medium,
        keys.join(", ")
    )
}

fn user_prompt(request: &ExtractionRequest) -> String {
    let known: Vec<&str> = request.known_fields.iter().map(|(f, _)| f.key()).collect();
    let asked = request
        .last_prompt_field
        .map(|f| f.key())
        .unwrap_or("none");
    format!(
        "Already collected: [{}]\nLast question asked for: {}\nUser said: {}",
        known.join(", "),
        asked,
        request.utterance
    )
}

/// Turns the model's JSON object into port output.
fn parse_extraction(content: &str) -> Result<ExtractionResult, ExtractionError> {
    let parsed: ExtractionPayload = serde_json::from_str(content)
        .map_err(|e| ExtractionError::Parse(format!("Model returned invalid JSON: {}", e)))?;

    let candidates = parsed
        .fields
        .into_iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(field, value)| RawCandidate { field, value })
        .collect();

    Ok(ExtractionResult {
        candidates,
        suggested_prompt: parsed.next_prompt.filter(|p| !p.trim().is_empty()),
    })
}

// ════════════════════════════════════════════════════════════════════════════
// Wire types
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExtractionPayload {
    #[serde(default)]
    fields: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    next_prompt: Option<String>,
}
