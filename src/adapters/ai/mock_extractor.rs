//! Mock Field Extractor for testing.
//!
//! Answers by utterance: each scripted utterance maps to a result or an
//! error, anything unscripted extracts nothing.
//!
//! # Example
//!
//! ```ignore
//! let extractor = MockFieldExtractor::new()
//!     .on("I'm John Doe", ExtractionResult::empty()
//!         .with_candidate("first_name", "John")
//!         .with_candidate("last_name", "Doe"))
//!     .failing_on("garbled", ExtractionError::Unavailable { message: "down".into() });
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{ExtractionError, ExtractionRequest, ExtractionResult, FieldExtractor};

/// Scripted extractor for tests and local runs without an LLM.
#[derive(Debug, Clone, Default)]
pub struct MockFieldExtractor {
    script: Arc<Mutex<HashMap<String, Result<ExtractionResult, ExtractionError>>>>,
    /// Simulated latency per request.
    delay: Duration,
    /// Call history for verification.
    calls: Arc<Mutex<Vec<ExtractionRequest>>>,
}

impl MockFieldExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the result for an utterance (matched after trimming).
    pub fn on(self, utterance: &str, result: ExtractionResult) -> Self {
        lock(&self.script).insert(utterance.trim().to_string(), Ok(result));
        self
    }

    /// Scripts an error for an utterance.
    pub fn failing_on(self, utterance: &str, error: ExtractionError) -> Self {
        lock(&self.script).insert(utterance.trim().to_string(), Err(error));
        self
    }

    /// Sets a simulated delay for every request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns the number of extract calls made.
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Returns all requests received.
    pub fn calls(&self) -> Vec<ExtractionRequest> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl FieldExtractor for MockFieldExtractor {
    async fn extract(&self, request: ExtractionRequest) -> Result<ExtractionResult, ExtractionError> {
        let scripted = lock(&self.script).get(request.utterance.trim()).cloned();
        lock(&self.calls).push(request);

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        scripted.unwrap_or_else(|| Ok(ExtractionResult::empty()))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Channel;

    #[tokio::test]
    async fn scripted_utterance_returns_result() {
        let extractor = MockFieldExtractor::new()
            .on("John", ExtractionResult::empty().with_candidate("first_name", "John"));

        let result = extractor
            .extract(ExtractionRequest::new(Channel::Text, "  John "))
            .await
            .unwrap();

        assert_eq!(result.candidates.len(), 1);
        assert_eq!(extractor.call_count(), 1);
    }

    #[tokio::test]
    async fn unscripted_utterance_extracts_nothing() {
        let extractor = MockFieldExtractor::new();
        let result = extractor
            .extract(ExtractionRequest::new(Channel::Voice, "hmm"))
            .await
            .unwrap();
        assert!(result.candidates.is_empty());
    }

    #[tokio::test]
    async fn scripted_error_is_returned() {
        let extractor = MockFieldExtractor::new().failing_on("x", ExtractionError::AuthenticationFailed);
        let err = extractor
            .extract(ExtractionRequest::new(Channel::Text, "x"))
            .await
            .unwrap_err();
        assert_eq!(err, ExtractionError::AuthenticationFailed);
    }

    #[tokio::test]
    async fn records_requests() {
        let extractor = MockFieldExtractor::new();
        extractor
            .extract(ExtractionRequest::new(Channel::Text, "hello"))
            .await
            .unwrap();
        assert_eq!(extractor.calls()[0].utterance, "hello");
    }
}
