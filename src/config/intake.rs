//! Intake behaviour configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::TurnProcessorConfig;
use crate::domain::foundation::Timestamp;
use crate::domain::intake::DEFAULT_MAX_CONFIRMATION_ATTEMPTS;

/// Tunables for the conversation and reconciliation flows.
#[derive(Debug, Clone, Deserialize)]
pub struct IntakeConfig {
    /// Unclear replies allowed before a confirmation is treated as rejected
    #[serde(default = "default_max_confirmation_attempts")]
    pub max_confirmation_attempts: u32,

    /// Idle time after which an open session is closed as abandoned
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,

    /// How often the janitor sweeps for abandoned sessions
    #[serde(default = "default_janitor_interval")]
    pub janitor_interval_secs: u64,

    /// Parallel submissions during retry-all
    #[serde(default = "default_retry_concurrency")]
    pub retry_concurrency: usize,

    /// Longest utterance (in words) the short-reply rule attributes to the asked field
    #[serde(default = "default_short_reply_max_words")]
    pub short_reply_max_words: usize,

    /// Fixed year for vehicle-year bounds; the current year when unset
    pub reference_year: Option<i32>,
}

impl IntakeConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn janitor_interval(&self) -> Duration {
        Duration::from_secs(self.janitor_interval_secs)
    }

    pub fn reference_year(&self) -> i32 {
        self.reference_year.unwrap_or_else(|| Timestamp::now().year())
    }

    /// Validate intake configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_confirmation_attempts == 0 {
            return Err(ValidationError::BelowMinimum {
                field: "max_confirmation_attempts",
                min: 1,
            });
        }
        if self.session_ttl_secs < 60 {
            return Err(ValidationError::BelowMinimum {
                field: "session_ttl_secs",
                min: 60,
            });
        }
        if self.janitor_interval_secs == 0 {
            return Err(ValidationError::BelowMinimum {
                field: "janitor_interval_secs",
                min: 1,
            });
        }
        if self.retry_concurrency == 0 {
            return Err(ValidationError::BelowMinimum {
                field: "retry_concurrency",
                min: 1,
            });
        }
        Ok(())
    }
}

impl From<&IntakeConfig> for TurnProcessorConfig {
    fn from(config: &IntakeConfig) -> Self {
        TurnProcessorConfig::default()
            .with_max_confirmation_attempts(config.max_confirmation_attempts)
            .with_short_reply_max_words(config.short_reply_max_words)
            .with_reference_year(config.reference_year())
    }
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            max_confirmation_attempts: default_max_confirmation_attempts(),
            session_ttl_secs: default_session_ttl(),
            janitor_interval_secs: default_janitor_interval(),
            retry_concurrency: default_retry_concurrency(),
            short_reply_max_words: default_short_reply_max_words(),
            reference_year: None,
        }
    }
}

fn default_max_confirmation_attempts() -> u32 {
    DEFAULT_MAX_CONFIRMATION_ATTEMPTS
}

fn default_session_ttl() -> u64 {
    30 * 60
}

fn default_janitor_interval() -> u64 {
    60
}

fn default_retry_concurrency() -> usize {
    4
}

fn default_short_reply_max_words() -> usize {
    4
}
