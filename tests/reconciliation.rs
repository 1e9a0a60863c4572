//! Integration tests for operator reconciliation of failed submissions.
//!
//! Failed outcomes are seeded through `LeadSubmitter` against a sink that
//! refuses, then retried through `ReconciliationService` once it recovers.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use lead_intake::adapters::{InMemoryOutcomeLedger, MockLeadSink};
use lead_intake::application::{LeadSubmitter, ReconciliationError, ReconciliationService};
use lead_intake::domain::foundation::{Channel, OutcomeId, SessionKey, Timestamp};
use lead_intake::domain::intake::IntakeSession;
use lead_intake::domain::lead::{LeadField, Validator};
use lead_intake::domain::submission::{OutcomeFilter, OutcomeStatus, SubmissionOutcome};
use lead_intake::ports::{OutcomeLedger, SubmissionError};

// =============================================================================
// Test Infrastructure
// =============================================================================

fn completed_session(channel: Channel, key: &str) -> IntakeSession {
    let validator = Validator::new(2025);
    let mut session = IntakeSession::new(channel, SessionKey::new(key).unwrap(), None, None);
    for (field, value) in [
        (LeadField::FirstName, "John"),
        (LeadField::LastName, "Doe"),
        (LeadField::ResidenceState, "TX"),
        (LeadField::Phone, "(555) 223-4567"),
        (LeadField::Email, "john@gmail.com"),
        (LeadField::VehicleMake, "Toyota"),
        (LeadField::VehicleModel, "Camry"),
        (LeadField::VehicleYear, "2019"),
    ] {
        session.commit(validator.accept(field, value).unwrap()).unwrap();
    }
    session
}

struct Desk {
    submitter: LeadSubmitter,
    service: ReconciliationService,
    ledger: InMemoryOutcomeLedger,
    sink: MockLeadSink,
}

fn desk(sink: MockLeadSink) -> Desk {
    let ledger = InMemoryOutcomeLedger::new();
    Desk {
        submitter: LeadSubmitter::new(Arc::new(sink.clone()), Arc::new(ledger.clone())),
        service: ReconciliationService::new(Arc::new(ledger.clone()), Arc::new(sink.clone()))
            .with_concurrency(2),
        ledger,
        sink,
    }
}

async fn seed_failures(desk: &Desk, count: usize) -> Vec<SubmissionOutcome> {
    let mut outcomes = Vec::new();
    for i in 0..count {
        let session = completed_session(Channel::Text, &format!("thread-{}", i));
        outcomes.push(desk.submitter.submit(&session).await.unwrap());
    }
    outcomes
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn failed_submissions_are_listed_and_shown() {
    let desk = desk(MockLeadSink::failing(SubmissionError::Network(
        "connection refused".to_string(),
    )));
    let seeded = seed_failures(&desk, 2).await;

    let listed = desk.service.list().await.unwrap();
    let shown = desk.service.show(seeded[1].id()).await.unwrap();

    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|o| o.status() == OutcomeStatus::Failed));
    assert_eq!(shown.id(), seeded[1].id());
    assert!(shown.error_message().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn retry_after_recovery_resolves_the_outcome() {
    let desk = desk(MockLeadSink::failing(SubmissionError::AuthenticationFailed));
    let seeded = seed_failures(&desk, 1).await;
    desk.sink.recover();

    let retried = desk.service.retry(seeded[0].id()).await.unwrap();

    assert_eq!(retried.status(), OutcomeStatus::Succeeded);
    assert_eq!(retried.retry_count(), 1);
    assert!(retried.error_message().is_none());
    assert!(retried.external_response().is_some());
    assert!(desk.service.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn retry_while_still_down_counts_the_attempt() {
    let desk = desk(MockLeadSink::failing(SubmissionError::Network("down".to_string())));
    let seeded = seed_failures(&desk, 1).await;
    desk.sink.recover();
    desk.sink.push_reply(Err(SubmissionError::Rejected {
        status: 422,
        body: "bad state".to_string(),
    }));

    let retried = desk.service.retry(seeded[0].id()).await.unwrap();

    assert_eq!(retried.status(), OutcomeStatus::Failed);
    assert_eq!(retried.retry_count(), 1);
    assert!(retried.last_retry_at().is_some());
    assert!(retried.error_message().unwrap().contains("422"));
}

#[tokio::test]
async fn resolved_and_unknown_outcomes_are_refused() {
    let desk = desk(MockLeadSink::new());
    let done = desk
        .submitter
        .submit(&completed_session(Channel::Voice, "CA-1"))
        .await
        .unwrap();

    let resolved = desk.service.retry(done.id()).await.unwrap_err();
    let missing = desk.service.show(&OutcomeId::new()).await.unwrap_err();

    assert!(matches!(resolved, ReconciliationError::AlreadyResolved(_)));
    assert!(matches!(missing, ReconciliationError::NotFound(_)));
    assert_eq!(desk.sink.submission_count(), 1);
}

#[tokio::test]
async fn retry_all_resolves_every_failure() {
    let desk = desk(MockLeadSink::failing(SubmissionError::Network("down".to_string())));
    seed_failures(&desk, 5).await;
    desk.sink.recover();

    let summary = desk.service.retry_all().await.unwrap();

    assert_eq!(summary.attempted, 5);
    assert_eq!(summary.succeeded, 5);
    assert!(summary.all_resolved());
    assert!(desk.ledger.list_failed().await.unwrap().is_empty());
}

#[tokio::test]
async fn retry_all_reports_stragglers() {
    let desk = desk(MockLeadSink::failing(SubmissionError::Network("down".to_string())));
    seed_failures(&desk, 3).await;

    let summary = desk.service.retry_all().await.unwrap();

    assert_eq!(summary.attempted, 3);
    assert_eq!(summary.failed, 3);
    assert!(!summary.all_resolved());
}

#[tokio::test]
async fn slow_crm_retry_times_out_as_failure() {
    let sink = MockLeadSink::new().with_delay(Duration::from_millis(200));
    let ledger = InMemoryOutcomeLedger::new();
    let failing = MockLeadSink::failing(SubmissionError::Network("down".to_string()));
    let seeded = LeadSubmitter::new(Arc::new(failing), Arc::new(ledger.clone()))
        .submit(&completed_session(Channel::Text, "thread-slow"))
        .await
        .unwrap();
    let service = ReconciliationService::new(Arc::new(ledger), Arc::new(sink))
        .with_timeout(Duration::from_millis(20));

    let retried = service.retry(seeded.id()).await.unwrap();

    assert_eq!(retried.status(), OutcomeStatus::Failed);
    assert!(retried.error_message().unwrap().contains("timed out"));
}

#[tokio::test]
async fn succeeded_listing_filters_by_channel_and_window() {
    let desk = desk(MockLeadSink::new());
    desk.submitter
        .submit(&completed_session(Channel::Text, "thread-1"))
        .await
        .unwrap();
    desk.submitter
        .submit(&completed_session(Channel::Voice, "CA-1"))
        .await
        .unwrap();

    let voice = desk
        .service
        .list_succeeded(&OutcomeFilter {
            since: None,
            channel: Some(Channel::Voice),
        })
        .await
        .unwrap();
    let future = desk
        .service
        .list_succeeded(&OutcomeFilter {
            since: Some(Timestamp::now().plus_secs(3600)),
            channel: None,
        })
        .await
        .unwrap();
    let recent = desk
        .service
        .list_succeeded(&OutcomeFilter {
            since: Some(Timestamp::now().minus(Duration::from_secs(3600))),
            channel: None,
        })
        .await
        .unwrap();

    assert_eq!(voice.len(), 1);
    assert_eq!(voice[0].channel(), Channel::Voice);
    assert!(future.is_empty());
    assert_eq!(recent.len(), 2);
    assert_eq!(
        recent[0].external_response(),
        Some(&json!({"id": format!("lead-{}", recent[0].session_id()), "success": true}))
    );
}
