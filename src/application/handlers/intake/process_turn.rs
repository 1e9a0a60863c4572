//! ProcessTurnHandler - entry point for every inbound message or utterance.
//!
//! Serializes turns per conversation, loads (or creates) the session, runs
//! the turn, persists it, and hands completed sessions to the submitter
//! after the lock is released. A turn on a completed session whose outcome
//! was never recorded submits it again, so transport redelivery recovers
//! from a failed ledger write.

use std::sync::Arc;

use super::error::IntakeError;
use super::turn_processor::TurnProcessor;
use crate::application::handlers::submission::LeadSubmitter;
use crate::application::SessionLocks;
use crate::domain::foundation::{Channel, CloseReason, SessionId, SessionKey};
use crate::domain::intake::{IntakeSession, Prompts};
use crate::domain::submission::SubmissionOutcome;
use crate::ports::{SessionLoad, SessionRepository};

/// One inbound turn from a transport.
#[derive(Debug, Clone)]
pub struct ProcessTurnCommand {
    pub channel: Channel,
    /// Thread id for text, call id for voice.
    pub session_key: String,
    /// Empty for call start or a blank message.
    pub utterance: String,
    /// Transport message id, used to drop redelivered webhooks.
    pub delivery_id: Option<String>,
    pub origin_address: Option<String>,
    pub destination_address: Option<String>,
}

impl ProcessTurnCommand {
    pub fn new(channel: Channel, session_key: impl Into<String>, utterance: impl Into<String>) -> Self {
        Self {
            channel,
            session_key: session_key.into(),
            utterance: utterance.into(),
            delivery_id: None,
            origin_address: None,
            destination_address: None,
        }
    }

    pub fn with_delivery_id(mut self, id: impl Into<String>) -> Self {
        self.delivery_id = Some(id.into());
        self
    }

    pub fn with_origin(mut self, address: impl Into<String>) -> Self {
        self.origin_address = Some(address.into());
        self
    }

    pub fn with_destination(mut self, address: impl Into<String>) -> Self {
        self.destination_address = Some(address.into());
        self
    }
}

/// What the transport should say back.
#[derive(Debug, Clone)]
pub struct ProcessTurnResult {
    pub session_id: SessionId,
    pub reply: String,
    /// True only on the turn that completed the lead.
    pub completed: bool,
    /// Outcome of the submission triggered by this turn.
    pub submission: Option<SubmissionOutcome>,
}

pub struct ProcessTurnHandler {
    sessions: Arc<dyn SessionRepository>,
    processor: Arc<TurnProcessor>,
    submitter: Arc<LeadSubmitter>,
    locks: SessionLocks,
}

impl ProcessTurnHandler {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        processor: Arc<TurnProcessor>,
        submitter: Arc<LeadSubmitter>,
        locks: SessionLocks,
    ) -> Self {
        Self {
            sessions,
            processor,
            submitter,
            locks,
        }
    }

    pub async fn handle(&self, cmd: ProcessTurnCommand) -> Result<ProcessTurnResult, IntakeError> {
        let key = SessionKey::new(cmd.session_key)?;
        let prompts = Prompts::for_channel(cmd.channel);

        let guard = self.locks.acquire(cmd.channel, &key).await;

        let SessionLoad {
            mut session,
            created,
        } = self
            .sessions
            .get_or_create(IntakeSession::new(
                cmd.channel,
                key,
                cmd.origin_address,
                cmd.destination_address,
            ))
            .await?;

        if created {
            tracing::info!(
                session_id = %session.id(),
                channel = %session.channel(),
                session_key = %session.session_key(),
                "Intake session created"
            );
        }

        if !session.is_open() {
            drop(guard);
            tracing::debug!(session_id = %session.id(), "Turn on closed session ignored");
            let submission = if session.fields().is_complete() {
                Some(self.submitter.submit(&session).await?)
            } else {
                None
            };
            return Ok(ProcessTurnResult {
                session_id: *session.id(),
                reply: prompts.closing().to_string(),
                completed: false,
                submission,
            });
        }

        if let Some(delivery_id) = cmd.delivery_id.as_deref() {
            if session.is_duplicate_delivery(delivery_id) {
                tracing::debug!(
                    session_id = %session.id(),
                    delivery_id,
                    "Duplicate delivery, replaying last prompt"
                );
                let reply = session
                    .last_prompt()
                    .map(str::to_string)
                    .or_else(|| session.fields().first_missing().map(|f| prompts.question(f)))
                    .unwrap_or_else(|| prompts.closing().to_string());
                return Ok(ProcessTurnResult {
                    session_id: *session.id(),
                    reply,
                    completed: false,
                    submission: None,
                });
            }
        }

        let turn = self
            .processor
            .process(&mut session, &cmd.utterance, created)
            .await?;

        if let Some(delivery_id) = cmd.delivery_id {
            session.record_delivery(delivery_id);
        }
        if turn.completed {
            session.close(CloseReason::Completed)?;
            tracing::info!(session_id = %session.id(), "Intake completed");
        }
        self.sessions.update(&mut session).await?;
        drop(guard);

        let submission = if turn.completed {
            Some(self.submitter.submit(&session).await?)
        } else {
            None
        };

        Ok(ProcessTurnResult {
            session_id: *session.id(),
            reply: turn.reply,
            completed: turn.completed,
            submission,
        })
    }
}
