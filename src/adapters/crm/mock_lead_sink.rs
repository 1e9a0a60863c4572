//! Mock lead sink for testing.
//!
//! Queued replies are consumed in order. Once the queue is empty the sink
//! either fails with its standing error or succeeds with a generated id.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::ports::{LeadSink, LeadSubmission, SubmissionError};

#[derive(Debug, Clone, Default)]
pub struct MockLeadSink {
    replies: Arc<Mutex<VecDeque<Result<serde_json::Value, SubmissionError>>>>,
    standing_error: Arc<Mutex<Option<SubmissionError>>>,
    submissions: Arc<Mutex<Vec<LeadSubmission>>>,
    delay: Duration,
}

impl MockLeadSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that fails every submission until told otherwise.
    pub fn failing(error: SubmissionError) -> Self {
        let sink = Self::new();
        *lock(&sink.standing_error) = Some(error);
        sink
    }

    pub fn with_reply(self, reply: Result<serde_json::Value, SubmissionError>) -> Self {
        self.push_reply(reply);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn push_reply(&self, reply: Result<serde_json::Value, SubmissionError>) {
        lock(&self.replies).push_back(reply);
    }

    /// Drops queued replies and the standing error so later submissions succeed.
    pub fn recover(&self) {
        lock(&self.replies).clear();
        *lock(&self.standing_error) = None;
    }

    pub fn submissions(&self) -> Vec<LeadSubmission> {
        lock(&self.submissions).clone()
    }

    pub fn submission_count(&self) -> usize {
        lock(&self.submissions).len()
    }
}

#[async_trait]
impl LeadSink for MockLeadSink {
    async fn submit(&self, lead: &LeadSubmission) -> Result<serde_json::Value, SubmissionError> {
        lock(&self.submissions).push(lead.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(reply) = lock(&self.replies).pop_front() {
            return reply;
        }
        if let Some(error) = lock(&self.standing_error).clone() {
            return Err(error);
        }
        Ok(serde_json::json!({
            "id": format!("lead-{}", lead.session_id),
            "success": true,
        }))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
