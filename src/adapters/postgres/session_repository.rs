//! PostgreSQL implementation of SessionRepository.
//!
//! Persists intake sessions to the `intake_sessions` table. Collected fields
//! and confirmation state live in JSONB columns; `version` guards updates.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use crate::domain::foundation::{
    Channel, CloseReason, DomainError, ErrorCode, SessionId, SessionKey, SessionStatus, Timestamp,
};
use crate::domain::intake::{ConfirmationState, IntakeSession, PendingConfirmation};
use crate::domain::lead::{LeadField, LeadFields};
use crate::ports::{SessionLoad, SessionRepository};

const SESSION_COLUMNS: &str = r#"
    id, channel, session_key, origin_address, destination_address,
    fields, confirmation, queued_confirmations, last_prompt_field, last_prompt,
    last_delivery_id, caller_id_offered, status, close_reason, version,
    created_at, updated_at
"#;

/// PostgreSQL implementation of SessionRepository.
#[derive(Clone)]
pub struct PostgresSessionRepository {
    pool: PgPool,
}

impl PostgresSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PostgresSessionRepository {
    async fn get_or_create(&self, candidate: IntakeSession) -> Result<SessionLoad, DomainError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO intake_sessions (
                id, channel, session_key, origin_address, destination_address,
                fields, confirmation, queued_confirmations, last_prompt_field, last_prompt,
                last_delivery_id, caller_id_offered, status, close_reason, version,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ON CONFLICT (channel, session_key) DO NOTHING
            "#,
        )
        .bind(candidate.id().as_uuid())
        .bind(candidate.channel().as_str())
        .bind(candidate.session_key().as_str())
        .bind(candidate.origin_address())
        .bind(candidate.destination_address())
        .bind(Json(candidate.fields()))
        .bind(Json(candidate.confirmation()))
        .bind(Json(candidate.queued_confirmations()))
        .bind(candidate.last_prompt_field().map(|f| f.key()))
        .bind(candidate.last_prompt())
        .bind(candidate.last_delivery_id())
        .bind(candidate.caller_id_offered())
        .bind(candidate.status().as_str())
        .bind(candidate.close_reason().map(|r| r.as_str()))
        .bind(candidate.version())
        .bind(candidate.created_at().as_datetime())
        .bind(candidate.updated_at().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to insert session: {}", e),
            )
        })?;

        if inserted.rows_affected() == 1 {
            return Ok(SessionLoad {
                session: candidate,
                created: true,
            });
        }

        let existing = self
            .find_by_key(candidate.channel(), candidate.session_key())
            .await?
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!(
                        "Session {}/{} conflicted on insert but could not be read",
                        candidate.channel(),
                        candidate.session_key()
                    ),
                )
            })?;

        Ok(SessionLoad {
            session: existing,
            created: false,
        })
    }

    async fn update(&self, session: &mut IntakeSession) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE intake_sessions SET
                fields = $3,
                confirmation = $4,
                queued_confirmations = $5,
                last_prompt_field = $6,
                last_prompt = $7,
                last_delivery_id = $8,
                caller_id_offered = $9,
                status = $10,
                close_reason = $11,
                updated_at = $12,
                version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(session.id().as_uuid())
        .bind(session.version())
        .bind(Json(session.fields()))
        .bind(Json(session.confirmation()))
        .bind(Json(session.queued_confirmations()))
        .bind(session.last_prompt_field().map(|f| f.key()))
        .bind(session.last_prompt())
        .bind(session.last_delivery_id())
        .bind(session.caller_id_offered())
        .bind(session.status().as_str())
        .bind(session.close_reason().map(|r| r.as_str()))
        .bind(session.updated_at().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to update session: {}", e),
            )
        })?;

        if result.rows_affected() == 0 {
            let exists: (bool,) =
                sqlx::query_as("SELECT EXISTS (SELECT 1 FROM intake_sessions WHERE id = $1)")
                    .bind(session.id().as_uuid())
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| {
                        DomainError::new(
                            ErrorCode::DatabaseError,
                            format!("Failed to check session existence: {}", e),
                        )
                    })?;

            return Err(if exists.0 {
                DomainError::new(
                    ErrorCode::ConcurrentModification,
                    format!(
                        "Session {} was modified concurrently (expected version {})",
                        session.id(),
                        session.version()
                    ),
                )
            } else {
                DomainError::new(
                    ErrorCode::SessionNotFound,
                    format!("Session not found: {}", session.id()),
                )
            });
        }

        session.mark_persisted();
        Ok(())
    }

    async fn find_by_id(&self, id: &SessionId) -> Result<Option<IntakeSession>, DomainError> {
        let sql = format!("SELECT {} FROM intake_sessions WHERE id = $1", SESSION_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to fetch session: {}", e),
                )
            })?;

        row.map(row_to_session).transpose()
    }

    async fn find_by_key(
        &self,
        channel: Channel,
        key: &SessionKey,
    ) -> Result<Option<IntakeSession>, DomainError> {
        let sql = format!(
            "SELECT {} FROM intake_sessions WHERE channel = $1 AND session_key = $2",
            SESSION_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(channel.as_str())
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to fetch session by key: {}", e),
                )
            })?;

        row.map(row_to_session).transpose()
    }

    async fn find_open_idle_since(&self, cutoff: &Timestamp) -> Result<Vec<IntakeSession>, DomainError> {
        let sql = format!(
            "SELECT {} FROM intake_sessions WHERE status = 'open' AND updated_at < $1 ORDER BY updated_at ASC",
            SESSION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(cutoff.as_datetime())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to fetch idle sessions: {}", e),
                )
            })?;

        rows.into_iter().map(row_to_session).collect()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Helper functions
// ════════════════════════════════════════════════════════════════════════════

fn column<'r, T>(row: &'r sqlx::postgres::PgRow, name: &str) -> Result<T, DomainError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name).map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Failed to get {}: {}", name, e),
        )
    })
}

fn corrupt(what: &str, err: impl std::fmt::Display) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("Invalid {}: {}", what, err))
}

fn row_to_session(row: sqlx::postgres::PgRow) -> Result<IntakeSession, DomainError> {
    let id: uuid::Uuid = column(&row, "id")?;
    let channel: String = column(&row, "channel")?;
    let session_key: String = column(&row, "session_key")?;
    let origin_address: Option<String> = column(&row, "origin_address")?;
    let destination_address: Option<String> = column(&row, "destination_address")?;
    let fields: Json<LeadFields> = column(&row, "fields")?;
    let confirmation: Json<ConfirmationState> = column(&row, "confirmation")?;
    let queued: Json<Vec<PendingConfirmation>> = column(&row, "queued_confirmations")?;
    let last_prompt_field: Option<String> = column(&row, "last_prompt_field")?;
    let last_prompt: Option<String> = column(&row, "last_prompt")?;
    let last_delivery_id: Option<String> = column(&row, "last_delivery_id")?;
    let caller_id_offered: bool = column(&row, "caller_id_offered")?;
    let status: String = column(&row, "status")?;
    let close_reason: Option<String> = column(&row, "close_reason")?;
    let version: i64 = column(&row, "version")?;
    let created_at: chrono::DateTime<chrono::Utc> = column(&row, "created_at")?;
    let updated_at: chrono::DateTime<chrono::Utc> = column(&row, "updated_at")?;

    let last_prompt_field = last_prompt_field
        .map(|f| f.parse::<LeadField>())
        .transpose()
        .map_err(|e| corrupt("last_prompt_field", e))?;
    let close_reason = close_reason
        .map(|r| r.parse::<CloseReason>())
        .transpose()
        .map_err(|e| corrupt("close_reason", e))?;

    Ok(IntakeSession::reconstitute(
        SessionId::from_uuid(id),
        channel.parse::<Channel>().map_err(|e| corrupt("channel", e))?,
        SessionKey::new(session_key).map_err(|e| corrupt("session_key", e))?,
        origin_address,
        destination_address,
        fields.0,
        confirmation.0,
        queued.0,
        last_prompt_field,
        last_prompt,
        last_delivery_id,
        caller_id_offered,
        status.parse::<SessionStatus>().map_err(|e| corrupt("status", e))?,
        close_reason,
        version,
        Timestamp::from_datetime(created_at),
        Timestamp::from_datetime(updated_at),
    ))
}
