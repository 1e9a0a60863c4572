//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables carry the `LEAD_INTAKE` prefix
//! and nested values are separated by double underscores.
//!
//! # Example
//!
//! ```no_run
//! use lead_intake::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! println!("Session TTL: {:?}", config.intake.session_ttl());
//! ```

mod crm;
mod database;
mod error;
mod extraction;
mod intake;
mod runtime;

pub use crm::CrmConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use extraction::ExtractionConfig;
pub use intake::IntakeConfig;
pub use runtime::{Environment, RuntimeConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables
/// and validates the result.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Environment and logging
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// PostgreSQL connection
    pub database: DatabaseConfig,

    /// Field extractor (OpenAI)
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Downstream CRM
    #[serde(default)]
    pub crm: CrmConfig,

    /// Conversation and reconciliation tunables
    #[serde(default)]
    pub intake: IntakeConfig,
}

impl AppConfig {
    /// Load and validate configuration from environment variables
    ///
    /// # Environment Variable Format
    ///
    /// - `LEAD_INTAKE__DATABASE__URL=...` -> `database.url = ...`
    /// - `LEAD_INTAKE__INTAKE__SESSION_TTL_SECS=900` -> `intake.session_ttl_secs = 900`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, values
    /// cannot be parsed, or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config: AppConfig = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("LEAD_INTAKE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.runtime.validate()?;
        self.database.validate()?;
        self.extraction.validate()?;
        self.crm.validate(&self.runtime.environment)?;
        self.intake.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.runtime.is_production()
    }
}
