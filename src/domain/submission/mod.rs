//! Submission module - the outcome ledger's record type.

mod outcome;

pub use outcome::{OutcomeFilter, OutcomeStatus, SubmissionOutcome};
