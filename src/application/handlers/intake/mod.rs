//! Intake conversation handlers.

mod end_voice_conversation;
mod error;
mod expire_sessions;
mod process_turn;
mod turn_processor;

pub use end_voice_conversation::{
    EndVoiceConversationCommand, EndVoiceConversationHandler, EndVoiceConversationResult,
};
pub use error::IntakeError;
pub use expire_sessions::{ExpireSessionsHandler, ExpireSessionsResult};
pub use process_turn::{ProcessTurnCommand, ProcessTurnHandler, ProcessTurnResult};
pub use turn_processor::{TurnOutcome, TurnProcessor, TurnProcessorConfig};
