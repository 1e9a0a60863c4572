//! In-memory storage adapters for tests and local development.

mod in_memory_outcome_ledger;
mod in_memory_session_repository;

pub use in_memory_outcome_ledger::InMemoryOutcomeLedger;
pub use in_memory_session_repository::InMemorySessionRepository;
