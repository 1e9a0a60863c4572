//! LeadSubmitter - one delivery attempt per completed session.
//!
//! The attempt happens outside the conversation lock. Whatever the CRM
//! says, exactly one outcome row is written for the session; a failed row
//! waits for the reconciliation service. Submissions for one session are
//! serialized so a redelivered turn waits for an attempt in flight.

use std::sync::Arc;
use std::time::Duration;

use crate::application::SessionLocks;
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::intake::IntakeSession;
use crate::domain::submission::SubmissionOutcome;
use crate::ports::{LeadSink, LeadSubmission, OutcomeLedger};

/// Submits completed leads and records the result.
pub struct LeadSubmitter {
    sink: Arc<dyn LeadSink>,
    ledger: Arc<dyn OutcomeLedger>,
    timeout: Duration,
    in_flight: SessionLocks,
}

impl LeadSubmitter {
    pub fn new(sink: Arc<dyn LeadSink>, ledger: Arc<dyn OutcomeLedger>) -> Self {
        Self {
            sink,
            ledger,
            timeout: Duration::from_secs(20),
            in_flight: SessionLocks::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Submits the session's fields once and records the outcome.
    ///
    /// A session that already has an outcome is not submitted again; the
    /// stored outcome is returned instead.
    ///
    /// # Errors
    ///
    /// - `InvalidStateTransition` if a required field is missing
    /// - `DatabaseError` if the outcome cannot be recorded
    pub async fn submit(&self, session: &IntakeSession) -> Result<SubmissionOutcome, DomainError> {
        if !session.fields().is_complete() {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                "Cannot submit a lead with missing fields",
            )
            .with_detail("session_id", session.id().to_string()));
        }

        let _submitting = self
            .in_flight
            .acquire(session.channel(), session.session_key())
            .await;

        if let Some(existing) = self.ledger.find_by_session(session.id()).await? {
            tracing::debug!(
                session_id = %session.id(),
                outcome_id = %existing.id(),
                "Lead already submitted, skipping"
            );
            return Ok(existing);
        }

        let lead = LeadSubmission {
            session_id: *session.id(),
            channel: session.channel(),
            fields: session.fields().clone(),
        };

        let outcome = match deliver(self.sink.as_ref(), &lead, self.timeout).await {
            Ok(response) => {
                tracing::info!(session_id = %session.id(), "Lead submitted");
                SubmissionOutcome::succeeded(lead.session_id, lead.channel, lead.fields, response)
            }
            Err(error) => {
                tracing::warn!(
                    session_id = %session.id(),
                    error = %error,
                    "Lead submission failed, recorded for reconciliation"
                );
                SubmissionOutcome::failed(lead.session_id, lead.channel, lead.fields, error)
            }
        };

        match self.ledger.record(&outcome).await {
            Ok(()) => Ok(outcome),
            Err(e) if e.code == ErrorCode::DuplicateOutcome => self
                .ledger
                .find_by_session(session.id())
                .await?
                .ok_or(e),
            Err(e) => Err(e),
        }
    }
}

/// One bounded call to the sink. Errors come back as ledger-ready text.
pub(crate) async fn deliver(
    sink: &dyn LeadSink,
    lead: &LeadSubmission,
    timeout: Duration,
) -> Result<serde_json::Value, String> {
    match tokio::time::timeout(timeout, sink.submit(lead)).await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("submission timed out after {}ms", timeout.as_millis())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryOutcomeLedger, MockLeadSink};
    use crate::domain::foundation::CloseReason;
    use crate::domain::intake::test_support::*;
    use crate::domain::lead::LeadField;
    use crate::domain::submission::OutcomeStatus;
    use crate::ports::SubmissionError;

    fn completed_session() -> IntakeSession {
        let mut session = text_session();
        for (field, value) in [
            (LeadField::FirstName, "John"),
            (LeadField::LastName, "Doe"),
            (LeadField::ResidenceState, "Texas"),
            (LeadField::Phone, "(555) 223-4567"),
            (LeadField::Email, "john@gmail.com"),
            (LeadField::VehicleMake, "Toyota"),
            (LeadField::VehicleModel, "Camry"),
            (LeadField::VehicleYear, "2019"),
        ] {
            session.commit(accepted(field, value)).unwrap();
        }
        session.close(CloseReason::Completed).unwrap();
        session
    }

    #[tokio::test]
    async fn success_records_succeeded_outcome() {
        let sink = MockLeadSink::new();
        let ledger = Arc::new(InMemoryOutcomeLedger::new());
        let submitter = LeadSubmitter::new(Arc::new(sink.clone()), ledger.clone());

        let outcome = submitter.submit(&completed_session()).await.unwrap();

        assert_eq!(outcome.status(), OutcomeStatus::Succeeded);
        assert!(outcome.external_response().is_some());
        assert_eq!(sink.submission_count(), 1);
        assert_eq!(ledger.all().await.len(), 1);
    }

    #[tokio::test]
    async fn failure_records_failed_outcome_with_error() {
        let sink = MockLeadSink::failing(SubmissionError::Rejected {
            status: 400,
            body: "REQUIRED_FIELD_MISSING".to_string(),
        });
        let ledger = Arc::new(InMemoryOutcomeLedger::new());
        let submitter = LeadSubmitter::new(Arc::new(sink), ledger.clone());

        let outcome = submitter.submit(&completed_session()).await.unwrap();

        assert_eq!(outcome.status(), OutcomeStatus::Failed);
        assert!(outcome.error_message().unwrap().contains("400"));
        assert_eq!(ledger.list_failed().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn timeout_records_failed_outcome() {
        let sink = MockLeadSink::new().with_delay(Duration::from_millis(500));
        let ledger = Arc::new(InMemoryOutcomeLedger::new());
        let submitter = LeadSubmitter::new(Arc::new(sink), ledger)
            .with_timeout(Duration::from_millis(20));

        let outcome = submitter.submit(&completed_session()).await.unwrap();

        assert_eq!(outcome.status(), OutcomeStatus::Failed);
        assert_eq!(outcome.error_message(), Some("submission timed out after 20ms"));
    }

    #[tokio::test]
    async fn second_submit_reuses_existing_outcome() {
        let sink = MockLeadSink::new();
        let ledger = Arc::new(InMemoryOutcomeLedger::new());
        let submitter = LeadSubmitter::new(Arc::new(sink.clone()), ledger.clone());
        let session = completed_session();

        let first = submitter.submit(&session).await.unwrap();
        let second = submitter.submit(&session).await.unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(sink.submission_count(), 1);
        assert_eq!(ledger.all().await.len(), 1);
    }

    #[tokio::test]
    async fn ledger_write_failure_is_returned() {
        let sink = MockLeadSink::new();
        let ledger = Arc::new(InMemoryOutcomeLedger::new());
        ledger.fail_writes(true);
        let submitter = LeadSubmitter::new(Arc::new(sink.clone()), ledger.clone());

        let err = submitter.submit(&completed_session()).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert_eq!(sink.submission_count(), 1);
        assert!(ledger.all().await.is_empty());
    }

    #[tokio::test]
    async fn concurrent_submits_deliver_once() {
        let sink = MockLeadSink::new().with_delay(Duration::from_millis(50));
        let ledger = Arc::new(InMemoryOutcomeLedger::new());
        let submitter = LeadSubmitter::new(Arc::new(sink.clone()), ledger.clone());
        let session = completed_session();

        let (first, second) = tokio::join!(submitter.submit(&session), submitter.submit(&session));

        assert_eq!(first.unwrap().id(), second.unwrap().id());
        assert_eq!(sink.submission_count(), 1);
        assert_eq!(ledger.all().await.len(), 1);
    }

    #[tokio::test]
    async fn incomplete_session_is_refused() {
        let sink = MockLeadSink::new();
        let submitter = LeadSubmitter::new(Arc::new(sink.clone()), Arc::new(InMemoryOutcomeLedger::new()));

        let err = submitter.submit(&text_session()).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
        assert_eq!(sink.submission_count(), 0);
    }
}
