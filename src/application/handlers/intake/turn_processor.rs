//! TurnProcessor - one conversational step over an intake session.
//!
//! A turn either resolves the pending confirmation or collects new values:
//!
//! 1. **Confirming** - the reply goes to the `ConfirmationController`;
//!    extraction is skipped entirely.
//! 2. **Collecting** - the extractor proposes candidates, each is
//!    normalized and validated, valid values commit (phone and email open a
//!    confirmation instead), and the next unmet field is asked for.
//!
//! Extraction failures and timeouts never surface: the previous prompt is
//! repeated and the session is left as it was.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::intake::{
    CandidateSource, ConfirmationController, ConfirmationOutcome, IntakeSession, Prompts,
    DEFAULT_MAX_CONFIRMATION_ATTEMPTS,
};
use crate::domain::lead::{CandidateFields, FieldIssue, LeadField, Normalizer, Validator};
use crate::ports::{ExtractionRequest, ExtractionResult, FieldExtractor};

/// Tunables for turn processing.
#[derive(Debug, Clone)]
pub struct TurnProcessorConfig {
    pub extraction_timeout: Duration,
    pub max_confirmation_attempts: u32,
    /// Longest label-free reply attributed to the field just asked for.
    pub short_reply_max_words: usize,
    /// Upper bound for vehicle years is `reference_year + 1`.
    pub reference_year: i32,
}

impl Default for TurnProcessorConfig {
    fn default() -> Self {
        Self {
            extraction_timeout: Duration::from_secs(8),
            max_confirmation_attempts: DEFAULT_MAX_CONFIRMATION_ATTEMPTS,
            short_reply_max_words: 4,
            reference_year: Timestamp::now().year(),
        }
    }
}

impl TurnProcessorConfig {
    pub fn with_extraction_timeout(mut self, timeout: Duration) -> Self {
        self.extraction_timeout = timeout;
        self
    }

    pub fn with_max_confirmation_attempts(mut self, attempts: u32) -> Self {
        self.max_confirmation_attempts = attempts;
        self
    }

    pub fn with_short_reply_max_words(mut self, words: usize) -> Self {
        self.short_reply_max_words = words;
        self
    }

    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = year;
        self
    }
}

/// What to say back, and whether every required field is now present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub reply: String,
    pub completed: bool,
}

impl TurnOutcome {
    fn ask(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            completed: false,
        }
    }

    fn complete(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            completed: true,
        }
    }
}

#[derive(Debug, Default)]
struct Merge {
    committed: usize,
    issue: Option<FieldIssue>,
}

/// Drives a session forward by one user utterance.
pub struct TurnProcessor {
    extractor: Arc<dyn FieldExtractor>,
    normalizer: Normalizer,
    validator: Validator,
    confirmations: ConfirmationController,
    config: TurnProcessorConfig,
}

impl TurnProcessor {
    pub fn new(extractor: Arc<dyn FieldExtractor>) -> Self {
        Self::with_config(extractor, TurnProcessorConfig::default())
    }

    pub fn with_config(extractor: Arc<dyn FieldExtractor>, config: TurnProcessorConfig) -> Self {
        Self {
            extractor,
            normalizer: Normalizer::new(config.reference_year),
            validator: Validator::new(config.reference_year),
            confirmations: ConfirmationController::new(config.max_confirmation_attempts),
            config,
        }
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Applies one utterance to the session.
    ///
    /// An empty utterance (call start, blank message) only prompts. The
    /// first turn of a new session is greeted.
    ///
    /// # Errors
    ///
    /// - `SessionClosed` if the session is already closed
    pub async fn process(
        &self,
        session: &mut IntakeSession,
        utterance: &str,
        first_turn: bool,
    ) -> Result<TurnOutcome, DomainError> {
        let prompts = Prompts::for_channel(session.channel());
        let utterance = utterance.trim();

        let outcome = if utterance.is_empty() {
            self.resume(session, &prompts)?
        } else if session.pending_confirmation().is_some() {
            self.confirm(session, utterance, &prompts)?
        } else {
            self.collect(session, utterance, &prompts).await?
        };

        if first_turn && !outcome.completed {
            return Ok(TurnOutcome::ask(format!(
                "{} {}",
                prompts.greeting(),
                outcome.reply
            )));
        }
        Ok(outcome)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Turn kinds
    // ─────────────────────────────────────────────────────────────────────────

    fn resume(
        &self,
        session: &mut IntakeSession,
        prompts: &Prompts,
    ) -> Result<TurnOutcome, DomainError> {
        if let Some(pending) = session.pending_confirmation() {
            return Ok(TurnOutcome::ask(prompts.confirmation(pending)));
        }
        self.advance(session, prompts, false, None)
    }

    fn confirm(
        &self,
        session: &mut IntakeSession,
        utterance: &str,
        prompts: &Prompts,
    ) -> Result<TurnOutcome, DomainError> {
        let Some(outcome) = self.confirmations.resolve(session, utterance)? else {
            return self.advance(session, prompts, false, None);
        };

        match outcome {
            ConfirmationOutcome::Confirmed { .. } => self.advance(session, prompts, true, None),
            ConfirmationOutcome::Rejected { field, .. } => {
                let reply = prompts.rejected(field);
                session.record_prompt(Some(field), reply.clone());
                Ok(TurnOutcome::ask(reply))
            }
            ConfirmationOutcome::Repeat { pending } => {
                let reply = prompts.confirmation(&pending);
                session.record_prompt(Some(pending.field()), reply.clone());
                Ok(TurnOutcome::ask(reply))
            }
        }
    }

    async fn collect(
        &self,
        session: &mut IntakeSession,
        utterance: &str,
        prompts: &Prompts,
    ) -> Result<TurnOutcome, DomainError> {
        let request = ExtractionRequest::new(session.channel(), utterance)
            .with_known_fields(session.fields().clone())
            .with_last_prompt_field(session.last_prompt_field());

        let Some(extraction) = self.extract(session, request).await else {
            return self.repeat_last(session, prompts);
        };

        let mut candidates = CandidateFields::from_raw(&extraction.candidates);
        if candidates.is_empty() {
            if let Some(field) = self.short_reply_target(session, utterance) {
                tracing::debug!(
                    session_id = %session.id(),
                    field = %field,
                    "Attributing short reply to the field just asked for"
                );
                candidates = CandidateFields::single(field, utterance);
            }
        }

        let merge = self.merge(session, &candidates)?;

        if let Some((field, reply)) = session
            .pending_confirmation()
            .map(|p| (p.field(), prompts.confirmation(p)))
        {
            session.record_prompt(Some(field), reply.clone());
            return Ok(TurnOutcome::ask(reply));
        }

        if let Some(issue) = merge.issue {
            let reply = prompts.invalid(&issue);
            session.record_prompt(Some(issue.field()), reply.clone());
            return Ok(TurnOutcome::ask(reply));
        }

        self.advance(session, prompts, merge.committed > 0, extraction.suggested_prompt)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Private helpers
    // ─────────────────────────────────────────────────────────────────────────

    async fn extract(
        &self,
        session: &IntakeSession,
        request: ExtractionRequest,
    ) -> Option<ExtractionResult> {
        let timeout = self.config.extraction_timeout;
        match tokio::time::timeout(timeout, self.extractor.extract(request)).await {
            Ok(Ok(result)) => Some(result),
            Ok(Err(e)) => {
                tracing::warn!(
                    session_id = %session.id(),
                    error = %e,
                    "Field extraction failed, repeating last prompt"
                );
                None
            }
            Err(_) => {
                tracing::warn!(
                    session_id = %session.id(),
                    timeout_ms = timeout.as_millis() as u64,
                    "Field extraction timed out, repeating last prompt"
                );
                None
            }
        }
    }

    /// Normalizes, validates and commits candidates for fields not yet held.
    fn merge(
        &self,
        session: &mut IntakeSession,
        candidates: &CandidateFields,
    ) -> Result<Merge, DomainError> {
        let mut merge = Merge::default();

        for (field, raw) in candidates.iter() {
            if session.fields().contains(field) || session.is_awaiting_confirmation(field) {
                tracing::debug!(
                    session_id = %session.id(),
                    field = %field,
                    "Ignoring candidate for a field already collected"
                );
                continue;
            }

            let value = self.normalizer.normalize(field, raw);
            match self.validator.accept(field, &value) {
                Ok(accepted) if field.requires_confirmation() => {
                    session.request_confirmation(accepted, CandidateSource::Utterance)?;
                }
                Ok(accepted) => {
                    session.commit(accepted)?;
                    merge.committed += 1;
                    tracing::info!(session_id = %session.id(), field = %field, "Field committed");
                }
                Err(issue) => {
                    tracing::debug!(
                        session_id = %session.id(),
                        field = %field,
                        issue = ?issue,
                        "Candidate failed validation"
                    );
                    merge.issue.get_or_insert(issue);
                }
            }
        }

        Ok(merge)
    }

    /// Opens the next queued confirmation, offers caller id, or asks for
    /// the next unmet field.
    fn advance(
        &self,
        session: &mut IntakeSession,
        prompts: &Prompts,
        acknowledged: bool,
        suggested: Option<String>,
    ) -> Result<TurnOutcome, DomainError> {
        if let Some((field, reply)) = session
            .open_next_queued()?
            .map(|p| (p.field(), prompts.confirmation(p)))
        {
            session.record_prompt(Some(field), reply.clone());
            return Ok(TurnOutcome::ask(reply));
        }

        let Some(next) = session.fields().first_missing() else {
            return Ok(TurnOutcome::complete(prompts.closing()));
        };

        if next == LeadField::Phone {
            if let Some(reply) = self.offer_caller_id(session, prompts)? {
                session.record_prompt(Some(LeadField::Phone), reply.clone());
                return Ok(TurnOutcome::ask(reply));
            }
        }

        let reply = match suggested.filter(|s| !s.trim().is_empty()) {
            Some(suggested) => suggested,
            None if acknowledged => prompts.acknowledge_and_ask(next),
            None => prompts.question(next),
        };
        session.record_prompt(Some(next), reply.clone());
        Ok(TurnOutcome::ask(reply))
    }

    /// Offers the caller's own number once, if it is a valid phone.
    fn offer_caller_id(
        &self,
        session: &mut IntakeSession,
        prompts: &Prompts,
    ) -> Result<Option<String>, DomainError> {
        if session.caller_id_offered() {
            return Ok(None);
        }
        let Some(origin) = session.origin_address() else {
            return Ok(None);
        };

        let normalized = self.normalizer.normalize(LeadField::Phone, origin);
        session.mark_caller_id_offered();
        let Ok(candidate) = self.validator.accept(LeadField::Phone, &normalized) else {
            return Ok(None);
        };

        session.request_confirmation(candidate, CandidateSource::CallerId)?;
        Ok(session.pending_confirmation().map(|p| prompts.confirmation(p)))
    }

    fn repeat_last(
        &self,
        session: &mut IntakeSession,
        prompts: &Prompts,
    ) -> Result<TurnOutcome, DomainError> {
        match session.last_prompt() {
            Some(last) => Ok(TurnOutcome::ask(last)),
            None => self.advance(session, prompts, false, None),
        }
    }

    /// Field a short, label-free reply answers, if any.
    fn short_reply_target(&self, session: &IntakeSession, utterance: &str) -> Option<LeadField> {
        let field = session.last_prompt_field()?;
        if session.fields().contains(field) {
            return None;
        }
        let words = utterance.split_whitespace().count();
        let labelled = utterance.contains(':') || utterance.contains('=');
        (words <= self.config.short_reply_max_words && !labelled).then_some(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockFieldExtractor;
    use crate::domain::intake::test_support::*;
    use crate::ports::ExtractionError;

    fn processor(extractor: MockFieldExtractor) -> TurnProcessor {
        TurnProcessor::with_config(
            Arc::new(extractor),
            TurnProcessorConfig::default()
                .with_reference_year(2025)
                .with_extraction_timeout(Duration::from_millis(50)),
        )
    }

    fn with_fields(mut session: IntakeSession, fields: &[(LeadField, &str)]) -> IntakeSession {
        for (field, value) in fields {
            session.commit(accepted(*field, value)).unwrap();
        }
        session
    }

    #[tokio::test]
    async fn first_empty_turn_greets_and_asks_first_name() {
        let processor = processor(MockFieldExtractor::new());
        let mut session = text_session();

        let outcome = processor.process(&mut session, "", true).await.unwrap();

        assert!(outcome.reply.starts_with("Hi! Thanks for reaching out."));
        assert!(outcome.reply.ends_with("What is your first name?"));
        assert_eq!(session.last_prompt_field(), Some(LeadField::FirstName));
        assert_eq!(session.last_prompt(), Some("What is your first name?"));
    }

    #[tokio::test]
    async fn short_reply_fills_the_field_just_asked() {
        let processor = processor(MockFieldExtractor::new());
        let mut session = text_session();
        processor.process(&mut session, "", true).await.unwrap();

        let outcome = processor.process(&mut session, "John", false).await.unwrap();

        assert_eq!(session.fields().get(LeadField::FirstName), Some("John"));
        assert_eq!(outcome.reply, "Got it. What is your last name?");
    }

    #[tokio::test]
    async fn labelled_or_long_replies_are_not_attributed() {
        let processor = processor(MockFieldExtractor::new());
        let mut session = text_session();
        session.record_prompt(Some(LeadField::FirstName), "What is your first name?");

        processor.process(&mut session, "name: John", false).await.unwrap();
        processor
            .process(&mut session, "well I was wondering about your rates", false)
            .await
            .unwrap();

        assert!(session.fields().is_empty());
    }

    #[tokio::test]
    async fn extracted_fields_commit_and_caller_id_is_offered() {
        let extractor = MockFieldExtractor::new().on(
            "I'm John Doe from Texas",
            ExtractionResult::empty()
                .with_candidate("first_name", "John")
                .with_candidate("last_name", "Doe")
                .with_candidate("state", "Texas"),
        );
        let processor = processor(extractor);
        let mut session = text_session();

        let outcome = processor
            .process(&mut session, "I'm John Doe from Texas", false)
            .await
            .unwrap();

        assert_eq!(session.fields().len(), 3);
        assert_eq!(outcome.reply, "Is (555) 223-4567 the best number to reach you?");
        assert!(session.caller_id_offered());

        let outcome = processor.process(&mut session, "yes", false).await.unwrap();
        assert_eq!(session.fields().get(LeadField::Phone), Some("(555) 223-4567"));
        assert_eq!(outcome.reply, "Got it. What is your email address?");
    }

    #[tokio::test]
    async fn rejected_caller_id_asks_for_phone_and_is_not_offered_again() {
        let processor = processor(MockFieldExtractor::new());
        let mut session = with_fields(
            text_session(),
            &[
                (LeadField::FirstName, "John"),
                (LeadField::LastName, "Doe"),
                (LeadField::ResidenceState, "Texas"),
            ],
        );
        processor.process(&mut session, "", false).await.unwrap();

        let outcome = processor.process(&mut session, "no", false).await.unwrap();
        assert_eq!(outcome.reply, "Sorry about that. What is the best phone number to reach you?");

        let outcome = processor.process(&mut session, "", false).await.unwrap();
        assert_eq!(outcome.reply, "What is the best phone number to reach you?");
    }

    #[tokio::test]
    async fn spoken_email_is_normalized_and_confirmed() {
        let processor = processor(MockFieldExtractor::new());
        let mut session = text_session();
        session.record_prompt(Some(LeadField::Email), "What is your email address?");

        let outcome = processor.process(&mut session, "john at gmail", false).await.unwrap();

        assert_eq!(outcome.reply, "I have your email as john@gmail.com. Is that correct?");
        assert!(!session.fields().contains(LeadField::Email));
        assert!(session.is_awaiting_confirmation(LeadField::Email));
    }

    #[tokio::test]
    async fn malformed_phone_reprompts_with_reason() {
        let processor = processor(MockFieldExtractor::new());
        let mut session = text_session();
        session.mark_caller_id_offered();
        session.record_prompt(Some(LeadField::Phone), "What is the best phone number to reach you?");

        let outcome = processor.process(&mut session, "555-22-4567", false).await.unwrap();

        assert!(outcome.reply.starts_with("Sorry, "));
        assert!(outcome.reply.ends_with("What is the best phone number to reach you?"));
        assert!(!session.fields().contains(LeadField::Phone));
        assert!(session.pending_confirmation().is_none());
    }

    #[tokio::test]
    async fn collected_fields_are_not_overwritten() {
        let extractor = MockFieldExtractor::new().on(
            "actually call me Jane",
            ExtractionResult::empty().with_candidate("first_name", "Jane"),
        );
        let processor = processor(extractor);
        let mut session = with_fields(text_session(), &[(LeadField::FirstName, "John")]);

        processor
            .process(&mut session, "actually call me Jane", false)
            .await
            .unwrap();

        assert_eq!(session.fields().get(LeadField::FirstName), Some("John"));
    }

    #[tokio::test]
    async fn extraction_failure_repeats_last_prompt() {
        let extractor = MockFieldExtractor::new().failing_on(
            "I drive a Camry",
            ExtractionError::Unavailable {
                message: "overloaded".to_string(),
            },
        );
        let processor = processor(extractor);
        let mut session = text_session();
        session.record_prompt(Some(LeadField::LastName), "What is your last name?");
        let before = session.fields().clone();

        let outcome = processor.process(&mut session, "I drive a Camry", false).await.unwrap();

        assert_eq!(outcome.reply, "What is your last name?");
        assert_eq!(session.fields(), &before);
    }

    #[tokio::test]
    async fn extraction_timeout_repeats_last_prompt() {
        let extractor = MockFieldExtractor::new()
            .on("Doe", ExtractionResult::empty().with_candidate("last_name", "Doe"))
            .with_delay(Duration::from_millis(500));
        let processor = processor(extractor);
        let mut session = text_session();
        session.record_prompt(Some(LeadField::LastName), "What is your last name?");

        let outcome = processor.process(&mut session, "Doe", false).await.unwrap();

        assert_eq!(outcome.reply, "What is your last name?");
        assert!(session.fields().is_empty());
    }

    #[tokio::test]
    async fn confirmations_in_one_turn_are_queued() {
        let extractor = MockFieldExtractor::new().on(
            "reach me at 555 223 4567 or john@example.com",
            ExtractionResult::empty()
                .with_candidate("email", "john@example.com")
                .with_candidate("phone", "555 223 4567"),
        );
        let processor = processor(extractor);
        let mut session = text_session();

        let outcome = processor
            .process(&mut session, "reach me at 555 223 4567 or john@example.com", false)
            .await
            .unwrap();
        assert_eq!(outcome.reply, "I have your phone number as (555) 223-4567. Is that correct?");

        let outcome = processor.process(&mut session, "yes", false).await.unwrap();
        assert_eq!(outcome.reply, "I have your email as john@example.com. Is that correct?");
        assert_eq!(session.fields().get(LeadField::Phone), Some("(555) 223-4567"));
    }

    #[tokio::test]
    async fn unclear_replies_repeat_then_force_recollection() {
        let processor = processor(MockFieldExtractor::new());
        let mut session = voice_session();
        session.record_prompt(Some(LeadField::Email), "What is your email address?");
        let asked = processor.process(&mut session, "john at gmail", false).await.unwrap();

        let first = processor.process(&mut session, "hmm", false).await.unwrap();
        let second = processor.process(&mut session, "what", false).await.unwrap();
        assert_eq!(first.reply, asked.reply);
        assert_eq!(second.reply, asked.reply);

        let third = processor.process(&mut session, "maybe", false).await.unwrap();
        assert_eq!(third.reply, "Sorry about that. What is your email address?");
        assert!(session.pending_confirmation().is_none());
    }

    #[tokio::test]
    async fn suggested_prompt_is_used_for_next_question() {
        let extractor = MockFieldExtractor::new().on(
            "It's a Toyota",
            ExtractionResult::empty()
                .with_candidate("vehicle_make", "Toyota")
                .with_suggested_prompt("Nice! Which Toyota model is it?"),
        );
        let processor = processor(extractor);
        let mut session = with_fields(
            text_session(),
            &[
                (LeadField::FirstName, "John"),
                (LeadField::LastName, "Doe"),
                (LeadField::ResidenceState, "Texas"),
                (LeadField::Phone, "(555) 223-4567"),
                (LeadField::Email, "john@gmail.com"),
            ],
        );

        let outcome = processor.process(&mut session, "It's a Toyota", false).await.unwrap();

        assert_eq!(outcome.reply, "Nice! Which Toyota model is it?");
        assert_eq!(session.last_prompt_field(), Some(LeadField::VehicleModel));
    }

    #[tokio::test]
    async fn last_field_completes_the_session() {
        let processor = processor(MockFieldExtractor::new());
        let mut session = with_fields(
            voice_session(),
            &[
                (LeadField::FirstName, "John"),
                (LeadField::LastName, "Doe"),
                (LeadField::ResidenceState, "Texas"),
                (LeadField::Phone, "(555) 223-4567"),
                (LeadField::Email, "john@gmail.com"),
                (LeadField::VehicleMake, "Toyota"),
                (LeadField::VehicleModel, "Camry"),
            ],
        );
        session.record_prompt(Some(LeadField::VehicleYear), "What is the year of the vehicle?");

        let outcome = processor.process(&mut session, "it's a 2019", false).await.unwrap();

        assert!(outcome.completed);
        assert_eq!(session.fields().get(LeadField::VehicleYear), Some("2019"));
        assert!(outcome.reply.ends_with("Goodbye."));
    }

    #[tokio::test]
    async fn closed_session_is_rejected() {
        let processor = processor(MockFieldExtractor::new());
        let mut session = text_session();
        session.close(crate::domain::foundation::CloseReason::Abandoned).unwrap();
        session.record_prompt(Some(LeadField::FirstName), "What is your first name?");

        assert!(processor.process(&mut session, "John", false).await.is_err());
    }
}
