//! Submission and reconciliation handlers.

mod lead_submitter;
mod reconciliation;

pub use lead_submitter::LeadSubmitter;
pub use reconciliation::{ReconciliationError, ReconciliationService, RetrySummary};
