//! Field extraction configuration

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::adapters::OpenAIExtractorConfig;

/// OpenAI extractor settings.
///
/// Without an API key intake still runs; every turn then degrades to
/// "nothing extracted" and only caller-id offers and voice completion can
/// fill fields.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    /// OpenAI API key
    pub openai_api_key: Option<Secret<String>>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-call timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl ExtractionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check if an OpenAI key is configured
    pub fn has_openai(&self) -> bool {
        self.openai_api_key
            .as_ref()
            .is_some_and(|k| !k.expose_secret().trim().is_empty())
    }

    /// Validate extraction configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.timeout_secs == 0 || self.timeout_secs > 60 {
            return Err(ValidationError::InvalidTimeout("extraction"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ValidationError::InvalidExtractionUrl);
        }
        if self.model.trim().is_empty() {
            return Err(ValidationError::MissingRequired("EXTRACTION__MODEL"));
        }
        Ok(())
    }
}

impl TryFrom<&ExtractionConfig> for OpenAIExtractorConfig {
    type Error = ValidationError;

    /// Fails when no usable API key is configured.
    fn try_from(config: &ExtractionConfig) -> Result<Self, Self::Error> {
        let api_key = config
            .openai_api_key
            .clone()
            .filter(|_| config.has_openai())
            .ok_or(ValidationError::MissingRequired("EXTRACTION__OPENAI_API_KEY"))?;

        Ok(OpenAIExtractorConfig::from_secret(api_key)
            .with_model(config.model.clone())
            .with_base_url(config.base_url.clone())
            .with_timeout(config.timeout()))
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_timeout() -> u64 {
    8
}
