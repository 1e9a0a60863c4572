//! ReconciliationService - operator tooling over the outcome ledger.
//!
//! Failed outcomes are retried with the lead data stored at the time of
//! the first attempt. Every retry, good or bad, bumps `retry_count`.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use thiserror::Error;

use super::lead_submitter::deliver;
use crate::domain::foundation::{DomainError, OutcomeId};
use crate::domain::submission::{OutcomeFilter, SubmissionOutcome};
use crate::ports::{LeadSink, LeadSubmission, OutcomeLedger};

#[derive(Debug, Error)]
pub enum ReconciliationError {
    #[error("outcome not found: {0}")]
    NotFound(OutcomeId),

    #[error("outcome {0} was already submitted successfully")]
    AlreadyResolved(OutcomeId),

    #[error("ledger error: {0}")]
    Ledger(#[from] DomainError),
}

/// Aggregate result of `retry_all`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrySummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Outcomes whose retry could not even be recorded.
    pub errors: Vec<(OutcomeId, String)>,
}

impl RetrySummary {
    /// True when every failed outcome is now resolved.
    pub fn all_resolved(&self) -> bool {
        self.failed == 0 && self.errors.is_empty()
    }
}

pub struct ReconciliationService {
    ledger: Arc<dyn OutcomeLedger>,
    sink: Arc<dyn LeadSink>,
    timeout: Duration,
    concurrency: usize,
}

impl ReconciliationService {
    pub fn new(ledger: Arc<dyn OutcomeLedger>, sink: Arc<dyn LeadSink>) -> Self {
        Self {
            ledger,
            sink,
            timeout: Duration::from_secs(20),
            concurrency: 4,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Outcomes still waiting for a successful submission, oldest first.
    pub async fn list(&self) -> Result<Vec<SubmissionOutcome>, ReconciliationError> {
        Ok(self.ledger.list_failed().await?)
    }

    pub async fn show(&self, id: &OutcomeId) -> Result<SubmissionOutcome, ReconciliationError> {
        self.ledger
            .find_by_id(id)
            .await?
            .ok_or(ReconciliationError::NotFound(*id))
    }

    /// Succeeded outcomes, newest first.
    pub async fn list_succeeded(
        &self,
        filter: &OutcomeFilter,
    ) -> Result<Vec<SubmissionOutcome>, ReconciliationError> {
        Ok(self.ledger.list_succeeded(filter).await?)
    }

    /// Resubmits one failed outcome and returns it as updated.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown id
    /// - `AlreadyResolved` if the outcome already succeeded (nothing is sent)
    pub async fn retry(&self, id: &OutcomeId) -> Result<SubmissionOutcome, ReconciliationError> {
        let outcome = self.show(id).await?;
        if outcome.is_resolved() {
            return Err(ReconciliationError::AlreadyResolved(*id));
        }
        self.retry_outcome(outcome).await
    }

    /// Retries every failed outcome with bounded concurrency.
    pub async fn retry_all(&self) -> Result<RetrySummary, ReconciliationError> {
        let failed = self.ledger.list_failed().await?;
        let attempted = failed.len();

        let results: Vec<(OutcomeId, Result<SubmissionOutcome, ReconciliationError>)> =
            stream::iter(failed)
                .map(|outcome| async move {
                    let id = *outcome.id();
                    (id, self.retry_outcome(outcome).await)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        let mut summary = RetrySummary {
            attempted,
            ..Default::default()
        };
        for (id, result) in results {
            match result {
                Ok(outcome) if outcome.is_resolved() => summary.succeeded += 1,
                Ok(_) => summary.failed += 1,
                Err(e) => summary.errors.push((id, e.to_string())),
            }
        }

        tracing::info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            errors = summary.errors.len(),
            "Retry-all finished"
        );
        Ok(summary)
    }

    async fn retry_outcome(
        &self,
        mut outcome: SubmissionOutcome,
    ) -> Result<SubmissionOutcome, ReconciliationError> {
        let expected_retry_count = outcome.retry_count();
        let lead = LeadSubmission {
            session_id: *outcome.session_id(),
            channel: outcome.channel(),
            fields: outcome.lead_data().clone(),
        };

        match deliver(self.sink.as_ref(), &lead, self.timeout).await {
            Ok(response) => {
                outcome.record_retry_success(response)?;
                tracing::info!(
                    outcome_id = %outcome.id(),
                    retry_count = outcome.retry_count(),
                    "Retry succeeded"
                );
            }
            Err(error) => {
                tracing::warn!(
                    outcome_id = %outcome.id(),
                    retry_count = outcome.retry_count() + 1,
                    error = %error,
                    "Retry failed"
                );
                outcome.record_retry_failure(error)?;
            }
        }

        match self.ledger.update(&outcome, expected_retry_count).await {
            Ok(()) => Ok(outcome),
            Err(e) if e.is_concurrent_modification() => {
                // Another retry stored its result first; report what it stored.
                tracing::warn!(
                    outcome_id = %outcome.id(),
                    "Retry result discarded, outcome changed concurrently"
                );
                self.show(outcome.id()).await
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryOutcomeLedger, MockLeadSink};
    use crate::domain::foundation::{Channel, SessionId};
    use crate::domain::lead::{LeadField, LeadFields};
    use crate::domain::submission::OutcomeStatus;
    use crate::ports::SubmissionError;
    use serde_json::json;

    fn lead() -> LeadFields {
        [(LeadField::FirstName, "John".to_string())].into_iter().collect()
    }

    async fn seeded(ledger: &InMemoryOutcomeLedger, failed: usize) -> Vec<OutcomeId> {
        let mut ids = Vec::new();
        for _ in 0..failed {
            let outcome = SubmissionOutcome::failed(SessionId::new(), Channel::Text, lead(), "boom");
            ledger.record(&outcome).await.unwrap();
            ids.push(*outcome.id());
        }
        ids
    }

    fn service(ledger: &InMemoryOutcomeLedger, sink: &MockLeadSink) -> ReconciliationService {
        ReconciliationService::new(Arc::new(ledger.clone()), Arc::new(sink.clone()))
    }

    #[tokio::test]
    async fn successful_retry_resolves_outcome() {
        let ledger = InMemoryOutcomeLedger::new();
        let sink = MockLeadSink::new();
        let ids = seeded(&ledger, 1).await;
        let service = service(&ledger, &sink);

        let outcome = service.retry(&ids[0]).await.unwrap();

        assert_eq!(outcome.status(), OutcomeStatus::Succeeded);
        assert_eq!(outcome.retry_count(), 1);
        assert!(outcome.error_message().is_none());
        assert!(outcome.last_retry_at().is_some());
        assert!(service.list().await.unwrap().is_empty());
        assert_eq!(sink.submissions()[0].fields, lead());
    }

    #[tokio::test]
    async fn failed_retry_keeps_status_and_replaces_error() {
        let ledger = InMemoryOutcomeLedger::new();
        let sink = MockLeadSink::failing(SubmissionError::Network("connection reset".to_string()));
        let ids = seeded(&ledger, 1).await;
        let service = service(&ledger, &sink);

        let outcome = service.retry(&ids[0]).await.unwrap();

        assert_eq!(outcome.status(), OutcomeStatus::Failed);
        assert_eq!(outcome.retry_count(), 1);
        assert_eq!(outcome.error_message(), Some("network error: connection reset"));
        assert_eq!(service.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn retry_unknown_id_is_not_found() {
        let ledger = InMemoryOutcomeLedger::new();
        let service = service(&ledger, &MockLeadSink::new());

        let err = service.retry(&OutcomeId::new()).await.unwrap_err();
        assert!(matches!(err, ReconciliationError::NotFound(_)));
    }

    #[tokio::test]
    async fn retry_resolved_outcome_sends_nothing() {
        let ledger = InMemoryOutcomeLedger::new();
        let sink = MockLeadSink::new();
        let outcome =
            SubmissionOutcome::succeeded(SessionId::new(), Channel::Voice, lead(), json!({"id": "1"}));
        ledger.record(&outcome).await.unwrap();

        let err = service(&ledger, &sink).retry(outcome.id()).await.unwrap_err();

        assert!(matches!(err, ReconciliationError::AlreadyResolved(_)));
        assert_eq!(sink.submission_count(), 0);
    }

    #[tokio::test]
    async fn retry_all_reports_counts() {
        let ledger = InMemoryOutcomeLedger::new();
        let sink = MockLeadSink::new()
            .with_reply(Err(SubmissionError::AuthenticationFailed));
        seeded(&ledger, 3).await;
        let service = service(&ledger, &sink).with_concurrency(1);

        let summary = service.retry_all().await.unwrap();

        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert!(!summary.all_resolved());
        assert_eq!(service.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn overlapping_retries_never_revert_a_success() {
        let ledger = InMemoryOutcomeLedger::new();
        let ids = seeded(&ledger, 1).await;
        let slow_failure = MockLeadSink::failing(SubmissionError::Network("reset".to_string()))
            .with_delay(Duration::from_millis(100));
        let fast_success = MockLeadSink::new();
        let slow = service(&ledger, &slow_failure);
        let fast = service(&ledger, &fast_success);

        let (a, b) = tokio::join!(slow.retry(&ids[0]), fast.retry(&ids[0]));

        assert_eq!(a.unwrap().status(), OutcomeStatus::Succeeded);
        assert_eq!(b.unwrap().status(), OutcomeStatus::Succeeded);
        let stored = ledger.find_by_id(&ids[0]).await.unwrap().unwrap();
        assert_eq!(stored.status(), OutcomeStatus::Succeeded);
        assert_eq!(stored.retry_count(), 1);
        assert!(stored.external_response().is_some());
        assert!(service(&ledger, &fast_success).list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn retry_all_with_nothing_failed_is_resolved() {
        let ledger = InMemoryOutcomeLedger::new();
        let summary = service(&ledger, &MockLeadSink::new()).retry_all().await.unwrap();

        assert_eq!(summary, RetrySummary::default());
        assert!(summary.all_resolved());
    }

    #[tokio::test]
    async fn list_succeeded_filters_by_channel() {
        let ledger = InMemoryOutcomeLedger::new();
        for channel in [Channel::Text, Channel::Voice, Channel::Voice] {
            let outcome = SubmissionOutcome::succeeded(SessionId::new(), channel, lead(), json!({}));
            ledger.record(&outcome).await.unwrap();
        }
        let service = service(&ledger, &MockLeadSink::new());

        let voice = service
            .list_succeeded(&OutcomeFilter {
                channel: Some(Channel::Voice),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(voice.len(), 2);
    }
}
