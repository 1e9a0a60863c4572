//! Foundation module - Shared domain primitives.
//!
//! Identifiers, timestamps, lifecycle statuses and error types that the
//! lead, intake and submission modules are built from.

mod channel;
mod errors;
mod ids;
mod session_status;
mod state_machine;
mod timestamp;

pub use channel::Channel;
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{OutcomeId, SessionId, SessionKey};
pub use session_status::{CloseReason, SessionStatus};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
