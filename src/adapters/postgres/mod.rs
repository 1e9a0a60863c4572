//! PostgreSQL adapters - Database implementations for storage ports.
//!
//! - `PostgresSessionRepository` - Versioned intake session storage
//! - `PostgresOutcomeLedger` - Submission outcome ledger
//! - `connect` / `run_migrations` - Pool setup

mod outcome_ledger;
mod pool;
mod session_repository;

pub use outcome_ledger::PostgresOutcomeLedger;
pub use pool::{connect, run_migrations};
pub use session_repository::PostgresSessionRepository;
