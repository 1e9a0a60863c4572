//! LeadFields - the validated values collected so far.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::LeadField;

/// Validated field values keyed by field, iterated in collection order.
///
/// Only values that passed validation are ever inserted; callers enforce
/// that through the intake session, which is the sole writer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadFields(BTreeMap<LeadField, String>);

impl LeadFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: LeadField) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: LeadField) -> bool {
        self.0.contains_key(&field)
    }

    pub(crate) fn insert(&mut self, field: LeadField, value: impl Into<String>) {
        self.0.insert(field, value.into());
    }

    pub(crate) fn remove(&mut self, field: LeadField) -> Option<String> {
        self.0.remove(&field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fields still to collect, in collection order.
    pub fn missing(&self) -> Vec<LeadField> {
        LeadField::all()
            .iter()
            .copied()
            .filter(|f| !self.contains(*f))
            .collect()
    }

    /// The next field to ask for.
    pub fn first_missing(&self) -> Option<LeadField> {
        LeadField::all().iter().copied().find(|f| !self.contains(*f))
    }

    pub fn is_complete(&self) -> bool {
        self.first_missing().is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LeadField, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Flat JSON object keyed by field key, the shape stored as `lead_data`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.iter()
                .map(|(k, v)| (k.key().to_string(), serde_json::Value::String(v.to_string())))
                .collect(),
        )
    }
}

impl FromIterator<(LeadField, String)> for LeadFields {
    fn from_iter<T: IntoIterator<Item = (LeadField, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
