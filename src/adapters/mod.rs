//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `storage` - In-memory session repository and outcome ledger
//! - `postgres` - PostgreSQL-backed session repository and outcome ledger
//! - `ai` - Field extractors (OpenAI, mock)
//! - `crm` - Lead sinks (HTTP CRM, mock)

pub mod ai;
pub mod crm;
pub mod postgres;
pub mod storage;

pub use ai::{MockFieldExtractor, OpenAIExtractorConfig, OpenAIFieldExtractor};
pub use crm::{HttpLeadSink, HttpLeadSinkConfig, MockLeadSink};
pub use postgres::{PostgresOutcomeLedger, PostgresSessionRepository};
pub use storage::{InMemoryOutcomeLedger, InMemorySessionRepository};
