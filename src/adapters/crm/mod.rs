//! Lead sink adapters.

mod http_lead_sink;
mod mock_lead_sink;

pub use http_lead_sink::{HttpLeadSink, HttpLeadSinkConfig};
pub use mock_lead_sink::MockLeadSink;
