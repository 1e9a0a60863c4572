//! Intake module - the conversational session and its confirmation sub-dialog.

mod confirmation;
mod prompts;
mod session;

pub use confirmation::{
    ConfirmationController, ConfirmationOutcome, ConfirmationReply,
    DEFAULT_MAX_CONFIRMATION_ATTEMPTS,
};
pub use prompts::{spell_email, Prompts};
pub use session::{
    CandidateSource, ConfirmationState, IntakeSession, PendingConfirmation,
};

#[cfg(test)]
pub(crate) use session::test_support;
