//! HTTP Lead Sink - posts completed leads to a CRM REST endpoint.
//!
//! Field names follow the CRM's lead object (`FirstName`, `LastName`, ...),
//! with the vehicle carried both in custom fields and a readable
//! description line.

use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use std::time::Duration;

use crate::domain::lead::{LeadField, LeadFields};
use crate::ports::{LeadSink, LeadSubmission, SubmissionError};

/// Company value stamped on every lead.
const LEAD_COMPANY: &str = "NPA Lead";

/// Configuration for the HTTP CRM sink.
#[derive(Debug, Clone)]
pub struct HttpLeadSinkConfig {
    pub base_url: String,
    api_token: Secret<String>,
    pub timeout: Duration,
}

impl HttpLeadSinkConfig {
    pub fn new(base_url: impl Into<String>, api_token: Secret<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token,
            timeout: Duration::from_secs(20),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn api_token(&self) -> &str {
        self.api_token.expose_secret()
    }
}

pub struct HttpLeadSink {
    config: HttpLeadSinkConfig,
    client: Client,
}

impl HttpLeadSink {
    pub fn new(config: HttpLeadSinkConfig) -> Result<Self, SubmissionError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SubmissionError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn leads_url(&self) -> String {
        format!("{}/leads", self.config.base_url.trim_end_matches('/'))
    }

    async fn handle_response_status(&self, response: Response) -> Result<Response, SubmissionError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        match status.as_u16() {
            401 | 403 => Err(SubmissionError::AuthenticationFailed),
            code => Err(SubmissionError::Rejected { status: code, body }),
        }
    }
}

#[async_trait]
impl LeadSink for HttpLeadSink {
    async fn submit(&self, lead: &LeadSubmission) -> Result<serde_json::Value, SubmissionError> {
        let body = CrmLead::from_fields(&lead.fields);

        let response = self
            .client
            .post(self.leads_url())
            .header("Authorization", format!("Bearer {}", self.config.api_token()))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SubmissionError::Timeout {
                        timeout_ms: self.config.timeout.as_millis() as u64,
                    }
                } else {
                    SubmissionError::Network(e.to_string())
                }
            })?;

        let response = self.handle_response_status(response).await?;
        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SubmissionError::Parse(format!("Failed to parse CRM response: {}", e)))?;

        tracing::debug!(
            session_id = %lead.session_id,
            crm_id = ?payload.get("id").or_else(|| payload.get("Id")),
            "CRM accepted lead"
        );
        Ok(payload)
    }
}

/// CRM wire shape for a lead.
#[derive(Debug, Serialize, PartialEq)]
struct CrmLead {
    #[serde(rename = "FirstName")]
    first_name: Option<String>,
    #[serde(rename = "LastName")]
    last_name: Option<String>,
    #[serde(rename = "Phone")]
    phone: Option<String>,
    #[serde(rename = "Email")]
    email: Option<String>,
    #[serde(rename = "State")]
    state: Option<String>,
    #[serde(rename = "Company")]
    company: &'static str,
    #[serde(rename = "Description")]
    description: String,
    #[serde(rename = "Custom_Vehicle_Make__c")]
    vehicle_make: Option<String>,
    #[serde(rename = "Custom_Vehicle_Model__c")]
    vehicle_model: Option<String>,
    #[serde(rename = "Custom_Vehicle_Year__c")]
    vehicle_year: Option<String>,
}

impl CrmLead {
    fn from_fields(fields: &LeadFields) -> Self {
        let get = |f: LeadField| fields.get(f).map(str::to_string);
        let vehicle = [LeadField::VehicleYear, LeadField::VehicleMake, LeadField::VehicleModel]
            .iter()
            .filter_map(|f| fields.get(*f))
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            first_name: get(LeadField::FirstName),
            last_name: get(LeadField::LastName),
            phone: get(LeadField::Phone),
            email: get(LeadField::Email),
            state: get(LeadField::ResidenceState),
            company: LEAD_COMPANY,
            description: format!("Vehicle: {}", vehicle),
            vehicle_make: get(LeadField::VehicleMake),
            vehicle_model: get(LeadField::VehicleModel),
            vehicle_year: get(LeadField::VehicleYear),
        }
    }
}
