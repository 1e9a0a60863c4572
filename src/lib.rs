//! Lead Intake - conversational lead capture over SMS and voice.
//!
//! Each inbound message or utterance advances an intake session until the
//! required lead fields are collected, confirmed where needed, and handed
//! to a downstream CRM. Failed submissions land in an outcome ledger that
//! operators reconcile from the `lead-intake` CLI.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
