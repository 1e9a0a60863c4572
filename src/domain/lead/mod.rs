//! Lead module - the eight required fields and their per-field rules.

mod candidates;
mod field;
mod fields;
mod normalizer;
mod validator;

pub use candidates::{CandidateFields, RawCandidate};
pub use field::LeadField;
pub use fields::LeadFields;
pub use normalizer::{national_digits, normalize_email, normalize_phone, Normalizer, MIN_VEHICLE_YEAR};
pub use validator::{FieldIssue, MalformedReason, ValidatedValue, Validator};
