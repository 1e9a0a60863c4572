//! PostgreSQL implementation of OutcomeLedger.
//!
//! The unique constraint on `session_id` enforces one outcome per session.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use crate::domain::foundation::{
    Channel, DomainError, ErrorCode, OutcomeId, SessionId, Timestamp,
};
use crate::domain::lead::LeadFields;
use crate::domain::submission::{OutcomeFilter, OutcomeStatus, SubmissionOutcome};
use crate::ports::OutcomeLedger;

const OUTCOME_COLUMNS: &str = r#"
    id, session_id, channel, lead_data, status, error_message, retry_count,
    last_retry_at, external_response, created_at, resolved_at
"#;

/// PostgreSQL implementation of OutcomeLedger.
#[derive(Clone)]
pub struct PostgresOutcomeLedger {
    pool: PgPool,
}

impl PostgresOutcomeLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OutcomeLedger for PostgresOutcomeLedger {
    async fn record(&self, outcome: &SubmissionOutcome) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO submission_outcomes (
                id, session_id, channel, lead_data, status, error_message, retry_count,
                last_retry_at, external_response, created_at, resolved_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(outcome.id().as_uuid())
        .bind(outcome.session_id().as_uuid())
        .bind(outcome.channel().as_str())
        .bind(Json(outcome.lead_data()))
        .bind(outcome.status().as_str())
        .bind(outcome.error_message())
        .bind(outcome.retry_count() as i32)
        .bind(outcome.last_retry_at().map(|t| *t.as_datetime()))
        .bind(outcome.external_response().map(Json))
        .bind(outcome.created_at().as_datetime())
        .bind(outcome.resolved_at().map(|t| *t.as_datetime()))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let unique_violation = e
                .as_database_error()
                .map(|db| db.is_unique_violation())
                .unwrap_or(false);
            if unique_violation {
                DomainError::new(
                    ErrorCode::DuplicateOutcome,
                    format!("Session {} already has an outcome", outcome.session_id()),
                )
            } else {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to insert outcome: {}", e),
                )
            }
        })?;

        Ok(())
    }

    async fn update(
        &self,
        outcome: &SubmissionOutcome,
        expected_retry_count: u32,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE submission_outcomes SET
                status = $2,
                error_message = $3,
                retry_count = $4,
                last_retry_at = $5,
                external_response = $6,
                resolved_at = $7
            WHERE id = $1 AND status = 'failed' AND retry_count = $8
            "#,
        )
        .bind(outcome.id().as_uuid())
        .bind(outcome.status().as_str())
        .bind(outcome.error_message())
        .bind(outcome.retry_count() as i32)
        .bind(outcome.last_retry_at().map(|t| *t.as_datetime()))
        .bind(outcome.external_response().map(Json))
        .bind(outcome.resolved_at().map(|t| *t.as_datetime()))
        .bind(expected_retry_count as i32)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to update outcome: {}", e),
            )
        })?;

        if result.rows_affected() == 0 {
            return match self.find_by_id(outcome.id()).await? {
                Some(_) => Err(DomainError::new(
                    ErrorCode::ConcurrentModification,
                    format!("Outcome {} was changed by another retry", outcome.id()),
                )
                .with_detail("outcome_id", outcome.id().to_string())),
                None => Err(DomainError::new(
                    ErrorCode::OutcomeNotFound,
                    format!("Outcome not found: {}", outcome.id()),
                )),
            };
        }

        Ok(())
    }

    async fn find_by_id(&self, id: &OutcomeId) -> Result<Option<SubmissionOutcome>, DomainError> {
        let sql = format!("SELECT {} FROM submission_outcomes WHERE id = $1", OUTCOME_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to fetch outcome: {}", e),
                )
            })?;

        row.map(row_to_outcome).transpose()
    }

    async fn find_by_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<SubmissionOutcome>, DomainError> {
        let sql = format!(
            "SELECT {} FROM submission_outcomes WHERE session_id = $1",
            OUTCOME_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(session_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to fetch outcome by session: {}", e),
                )
            })?;

        row.map(row_to_outcome).transpose()
    }

    async fn list_failed(&self) -> Result<Vec<SubmissionOutcome>, DomainError> {
        let sql = format!(
            "SELECT {} FROM submission_outcomes WHERE status = 'failed' ORDER BY created_at ASC",
            OUTCOME_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to list failed outcomes: {}", e),
                )
            })?;

        rows.into_iter().map(row_to_outcome).collect()
    }

    async fn list_succeeded(
        &self,
        filter: &OutcomeFilter,
    ) -> Result<Vec<SubmissionOutcome>, DomainError> {
        let sql = format!(
            r#"
            SELECT {} FROM submission_outcomes
            WHERE status = 'succeeded'
              AND ($1::timestamptz IS NULL OR resolved_at >= $1)
              AND ($2::text IS NULL OR channel = $2)
            ORDER BY resolved_at DESC
            "#,
            OUTCOME_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(filter.since.map(|t| *t.as_datetime()))
            .bind(filter.channel.map(|c| c.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to list succeeded outcomes: {}", e),
                )
            })?;

        rows.into_iter().map(row_to_outcome).collect()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Helper functions
// ════════════════════════════════════════════════════════════════════════════

fn row_to_outcome(row: sqlx::postgres::PgRow) -> Result<SubmissionOutcome, DomainError> {
    let get_err = |name: &str, e: sqlx::Error| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Failed to get {}: {}", name, e),
        )
    };

    let id: uuid::Uuid = row.try_get("id").map_err(|e| get_err("id", e))?;
    let session_id: uuid::Uuid = row.try_get("session_id").map_err(|e| get_err("session_id", e))?;
    let channel: String = row.try_get("channel").map_err(|e| get_err("channel", e))?;
    let lead_data: Json<LeadFields> = row.try_get("lead_data").map_err(|e| get_err("lead_data", e))?;
    let status: String = row.try_get("status").map_err(|e| get_err("status", e))?;
    let error_message: Option<String> =
        row.try_get("error_message").map_err(|e| get_err("error_message", e))?;
    let retry_count: i32 = row.try_get("retry_count").map_err(|e| get_err("retry_count", e))?;
    let last_retry_at: Option<chrono::DateTime<chrono::Utc>> =
        row.try_get("last_retry_at").map_err(|e| get_err("last_retry_at", e))?;
    let external_response: Option<Json<serde_json::Value>> =
        row.try_get("external_response").map_err(|e| get_err("external_response", e))?;
    let created_at: chrono::DateTime<chrono::Utc> =
        row.try_get("created_at").map_err(|e| get_err("created_at", e))?;
    let resolved_at: Option<chrono::DateTime<chrono::Utc>> =
        row.try_get("resolved_at").map_err(|e| get_err("resolved_at", e))?;

    let invalid = |what: &str, e: String| {
        DomainError::new(ErrorCode::DatabaseError, format!("Invalid {}: {}", what, e))
    };

    Ok(SubmissionOutcome::reconstitute(
        OutcomeId::from_uuid(id),
        SessionId::from_uuid(session_id),
        channel
            .parse::<Channel>()
            .map_err(|e| invalid("channel", e.to_string()))?,
        lead_data.0,
        status
            .parse::<OutcomeStatus>()
            .map_err(|e| invalid("status", e.to_string()))?,
        error_message,
        u32::try_from(retry_count).map_err(|e| invalid("retry_count", e.to_string()))?,
        last_retry_at.map(Timestamp::from_datetime),
        external_response.map(|j| j.0),
        Timestamp::from_datetime(created_at),
        resolved_at.map(Timestamp::from_datetime),
    ))
}
