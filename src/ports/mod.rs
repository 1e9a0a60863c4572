//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Storage Ports
//!
//! - `SessionRepository` - Keyed, versioned intake session storage
//! - `OutcomeLedger` - One submission outcome per session
//!
//! ## Collaborator Ports
//!
//! - `FieldExtractor` - Proposes field values from an utterance
//! - `LeadSink` - Accepts completed leads downstream

mod field_extractor;
mod lead_sink;
mod outcome_ledger;
mod session_repository;

pub use field_extractor::{ExtractionError, ExtractionRequest, ExtractionResult, FieldExtractor};
pub use lead_sink::{LeadSink, LeadSubmission, SubmissionError};
pub use outcome_ledger::OutcomeLedger;
pub use session_repository::{SessionLoad, SessionRepository};
