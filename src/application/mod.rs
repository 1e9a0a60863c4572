//! Application layer - Commands, Queries, and Handlers.
//!
//! Orchestrates domain operations and coordinates between ports. Intake
//! handlers drive the conversation; submission handlers talk to the CRM
//! and the outcome ledger.

pub mod handlers;
mod janitor;
mod session_locks;

pub use handlers::{
    // Intake handlers
    EndVoiceConversationCommand, EndVoiceConversationHandler, EndVoiceConversationResult,
    ExpireSessionsHandler, ExpireSessionsResult, IntakeError, ProcessTurnCommand,
    ProcessTurnHandler, ProcessTurnResult, TurnOutcome, TurnProcessor, TurnProcessorConfig,
    // Submission handlers
    LeadSubmitter, ReconciliationError, ReconciliationService, RetrySummary,
};
pub use janitor::SessionJanitor;
pub use session_locks::{SessionLockGuard, SessionLocks};
