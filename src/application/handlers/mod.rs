//! Command and query handlers.

pub mod intake;
pub mod submission;

pub use intake::{
    EndVoiceConversationCommand, EndVoiceConversationHandler, EndVoiceConversationResult,
    ExpireSessionsHandler, ExpireSessionsResult, IntakeError, ProcessTurnCommand,
    ProcessTurnHandler, ProcessTurnResult, TurnOutcome, TurnProcessor, TurnProcessorConfig,
};
pub use submission::{LeadSubmitter, ReconciliationError, ReconciliationService, RetrySummary};
