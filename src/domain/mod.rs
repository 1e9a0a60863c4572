//! Domain layer - lead fields, intake sessions and submission outcomes.
//!
//! Pure logic only: no I/O, no clocks beyond `Timestamp::now()`.

pub mod foundation;
pub mod intake;
pub mod lead;
pub mod submission;
