//! CRM (lead sink) configuration

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::Environment;

/// Downstream CRM settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CrmConfig {
    /// Base URL; leads are posted to `{base_url}/leads`
    pub base_url: Option<String>,

    /// Bearer token
    pub api_token: Option<Secret<String>>,

    /// Submission timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl CrmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Both URL and token are present
    pub fn is_configured(&self) -> bool {
        self.base_url.as_ref().is_some_and(|u| !u.trim().is_empty())
            && self
                .api_token
                .as_ref()
                .is_some_and(|t| !t.expose_secret().trim().is_empty())
    }

    /// Validate CRM configuration
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.timeout_secs == 0 || self.timeout_secs > 120 {
            return Err(ValidationError::InvalidTimeout("crm"));
        }
        let Some(url) = self.base_url.as_deref() else {
            return Ok(());
        };
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ValidationError::InvalidCrmUrl);
        }
        if *environment == Environment::Production && !url.starts_with("https://") {
            return Err(ValidationError::CrmMustBeHttps);
        }
        if !self.is_configured() {
            return Err(ValidationError::MissingRequired("CRM__API_TOKEN"));
        }
        Ok(())
    }
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_token: None,
            timeout_secs: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured(url: &str) -> CrmConfig {
        CrmConfig {
            base_url: Some(url.to_string()),
            api_token: Some(Secret::new("token".to_string())),
            ..Default::default()
        }
    }

    #[test]
    fn test_unconfigured_crm_is_valid() {
        let config = CrmConfig::default();
        assert!(!config.is_configured());
        assert!(config.validate(&Environment::Development).is_ok());
        assert_eq!(config.timeout(), Duration::from_secs(20));
    }

    #[test]
    fn test_url_without_token_is_rejected() {
        let config = CrmConfig {
            api_token: None,
            ..configured("https://crm.example.com")
        };
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::MissingRequired("CRM__API_TOKEN"))
        );
    }

    #[test]
    fn test_production_requires_https() {
        let config = configured("http://crm.internal");
        assert!(config.validate(&Environment::Staging).is_ok());
        assert_eq!(
            config.validate(&Environment::Production),
            Err(ValidationError::CrmMustBeHttps)
        );
    }

    #[test]
    fn test_rejects_non_http_url() {
        assert_eq!(
            configured("ftp://crm").validate(&Environment::Development),
            Err(ValidationError::InvalidCrmUrl)
        );
    }
}
