//! Field extractor adapters.
//!
//! - `OpenAIFieldExtractor` - Chat-completions backed extraction
//! - `MockFieldExtractor` - Scripted extraction for tests

mod mock_extractor;
mod openai_extractor;

pub use mock_extractor::MockFieldExtractor;
pub use openai_extractor::{OpenAIExtractorConfig, OpenAIFieldExtractor};
