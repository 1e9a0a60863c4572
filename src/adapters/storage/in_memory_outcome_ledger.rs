//! In-Memory Outcome Ledger
//!
//! Mirrors the PostgreSQL ledger's uniqueness rule: one outcome per session.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, OutcomeId, SessionId};
use crate::domain::submission::{OutcomeFilter, OutcomeStatus, SubmissionOutcome};
use crate::ports::OutcomeLedger;

/// In-memory outcome ledger.
#[derive(Clone, Default)]
pub struct InMemoryOutcomeLedger {
    outcomes: Arc<RwLock<HashMap<OutcomeId, SubmissionOutcome>>>,
    writes_failing: Arc<AtomicBool>,
}

impl InMemoryOutcomeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// All outcomes regardless of status.
    pub async fn all(&self) -> Vec<SubmissionOutcome> {
        self.outcomes.read().await.values().cloned().collect()
    }

    /// Makes `record` and `update` fail with `DatabaseError` until reset.
    pub fn fail_writes(&self, failing: bool) {
        self.writes_failing.store(failing, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), DomainError> {
        if self.writes_failing.load(Ordering::SeqCst) {
            return Err(DomainError::database("outcome ledger unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl OutcomeLedger for InMemoryOutcomeLedger {
    async fn record(&self, outcome: &SubmissionOutcome) -> Result<(), DomainError> {
        self.check_writable()?;
        let mut outcomes = self.outcomes.write().await;
        if outcomes.values().any(|o| o.session_id() == outcome.session_id()) {
            return Err(DomainError::new(
                ErrorCode::DuplicateOutcome,
                format!("Session {} already has an outcome", outcome.session_id()),
            ));
        }
        outcomes.insert(*outcome.id(), outcome.clone());
        Ok(())
    }

    async fn update(
        &self,
        outcome: &SubmissionOutcome,
        expected_retry_count: u32,
    ) -> Result<(), DomainError> {
        self.check_writable()?;
        let mut outcomes = self.outcomes.write().await;
        let Some(stored) = outcomes.get_mut(outcome.id()) else {
            return Err(DomainError::new(
                ErrorCode::OutcomeNotFound,
                format!("Outcome not found: {}", outcome.id()),
            ));
        };
        if stored.status() != OutcomeStatus::Failed || stored.retry_count() != expected_retry_count {
            return Err(stale_retry(outcome.id()));
        }
        *stored = outcome.clone();
        Ok(())
    }

    async fn find_by_id(&self, id: &OutcomeId) -> Result<Option<SubmissionOutcome>, DomainError> {
        Ok(self.outcomes.read().await.get(id).cloned())
    }

    async fn find_by_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<SubmissionOutcome>, DomainError> {
        Ok(self
            .outcomes
            .read()
            .await
            .values()
            .find(|o| o.session_id() == session_id)
            .cloned())
    }

    async fn list_failed(&self) -> Result<Vec<SubmissionOutcome>, DomainError> {
        let mut failed: Vec<SubmissionOutcome> = self
            .outcomes
            .read()
            .await
            .values()
            .filter(|o| o.status() == OutcomeStatus::Failed)
            .cloned()
            .collect();
        failed.sort_by_key(|o| *o.created_at());
        Ok(failed)
    }

    async fn list_succeeded(
        &self,
        filter: &OutcomeFilter,
    ) -> Result<Vec<SubmissionOutcome>, DomainError> {
        let mut succeeded: Vec<SubmissionOutcome> = self
            .outcomes
            .read()
            .await
            .values()
            .filter(|o| o.status() == OutcomeStatus::Succeeded && filter.matches(o))
            .cloned()
            .collect();
        succeeded.sort_by(|a, b| b.resolved_at().cmp(&a.resolved_at()));
        Ok(succeeded)
    }
}

fn stale_retry(id: &OutcomeId) -> DomainError {
    DomainError::new(
        ErrorCode::ConcurrentModification,
        format!("Outcome {} was changed by another retry", id),
    )
    .with_detail("outcome_id", id.to_string())
}
