//! Outcome ledger port.
//!
//! One `SubmissionOutcome` per session. Rows are updated in place by
//! retries and never deleted.

use crate::domain::foundation::{DomainError, OutcomeId, SessionId};
use crate::domain::submission::{OutcomeFilter, SubmissionOutcome};
use async_trait::async_trait;

#[async_trait]
pub trait OutcomeLedger: Send + Sync {
    /// Record the first outcome for a session.
    ///
    /// # Errors
    ///
    /// - `DuplicateOutcome` if the session already has an outcome
    /// - `DatabaseError` on persistence failure
    async fn record(&self, outcome: &SubmissionOutcome) -> Result<(), DomainError>;

    /// Store a retry result over a row that is still failed with
    /// `expected_retry_count` retries.
    ///
    /// # Errors
    ///
    /// - `OutcomeNotFound` if the outcome doesn't exist
    /// - `ConcurrentModification` if the stored row already succeeded or
    ///   another retry was stored first
    /// - `DatabaseError` on persistence failure
    async fn update(
        &self,
        outcome: &SubmissionOutcome,
        expected_retry_count: u32,
    ) -> Result<(), DomainError>;

    async fn find_by_id(&self, id: &OutcomeId) -> Result<Option<SubmissionOutcome>, DomainError>;

    async fn find_by_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<SubmissionOutcome>, DomainError>;

    /// Failed outcomes, oldest first.
    async fn list_failed(&self) -> Result<Vec<SubmissionOutcome>, DomainError>;

    /// Succeeded outcomes matching the filter, most recently resolved first.
    async fn list_succeeded(
        &self,
        filter: &OutcomeFilter,
    ) -> Result<Vec<SubmissionOutcome>, DomainError>;
}
