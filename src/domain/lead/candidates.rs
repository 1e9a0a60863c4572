//! Typed per-field candidates coerced from untyped extractor output.

use serde::{Deserialize, Serialize};

use super::LeadField;

/// One `(field, value)` pair exactly as an extractor produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCandidate {
    pub field: String,
    pub value: serde_json::Value,
}

impl RawCandidate {
    pub fn new(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Candidate values for this turn, at most one per field.
///
/// Unknown field names and non-scalar values are dropped at the boundary
/// so nothing downstream handles loosely typed data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateFields {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub residence_state: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_year: Option<String>,
}

impl CandidateFields {
    /// Coerces raw pairs. The first usable value for a field wins.
    pub fn from_raw(raw: &[RawCandidate]) -> Self {
        let mut candidates = Self::default();
        for item in raw {
            let Some(field) = LeadField::from_key(&item.field) else {
                tracing::debug!(field = %item.field, "Dropping candidate for unknown field");
                continue;
            };
            let Some(value) = scalar_text(&item.value) else {
                tracing::debug!(field = %field, "Dropping non-scalar candidate value");
                continue;
            };
            let slot = candidates.slot_mut(field);
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        candidates
    }

    /// Builds a candidate set holding a single field.
    pub fn single(field: LeadField, value: impl Into<String>) -> Self {
        let mut candidates = Self::default();
        candidates.set(field, value);
        candidates
    }

    pub fn get(&self, field: LeadField) -> Option<&str> {
        match field {
            LeadField::FirstName => self.first_name.as_deref(),
            LeadField::LastName => self.last_name.as_deref(),
            LeadField::ResidenceState => self.residence_state.as_deref(),
            LeadField::Phone => self.phone.as_deref(),
            LeadField::Email => self.email.as_deref(),
            LeadField::VehicleMake => self.vehicle_make.as_deref(),
            LeadField::VehicleModel => self.vehicle_model.as_deref(),
            LeadField::VehicleYear => self.vehicle_year.as_deref(),
        }
    }

    pub fn set(&mut self, field: LeadField, value: impl Into<String>) {
        *self.slot_mut(field) = Some(value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Present candidates in collection order.
    pub fn iter(&self) -> impl Iterator<Item = (LeadField, &str)> {
        LeadField::all()
            .iter()
            .filter_map(move |f| self.get(*f).map(|v| (*f, v)))
    }

    fn slot_mut(&mut self, field: LeadField) -> &mut Option<String> {
        match field {
            LeadField::FirstName => &mut self.first_name,
            LeadField::LastName => &mut self.last_name,
            LeadField::ResidenceState => &mut self.residence_state,
            LeadField::Phone => &mut self.phone,
            LeadField::Email => &mut self.email,
            LeadField::VehicleMake => &mut self.vehicle_make,
            LeadField::VehicleModel => &mut self.vehicle_model,
            LeadField::VehicleYear => &mut self.vehicle_year,
        }
    }
}

fn scalar_text(value: &serde_json::Value) -> Option<String> {
    let text = match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerces_strings_and_numbers() {
        let raw = vec![
            RawCandidate::new("first_name", "John"),
            RawCandidate::new("year", json!(2019)),
        ];
        let candidates = CandidateFields::from_raw(&raw);
        assert_eq!(candidates.first_name.as_deref(), Some("John"));
        assert_eq!(candidates.vehicle_year.as_deref(), Some("2019"));
    }

    #[test]
    fn drops_unknown_fields_and_non_scalars() {
        let raw = vec![
            RawCandidate::new("shoe_size", "11"),
            RawCandidate::new("email", json!(["a@b.com"])),
            RawCandidate::new("phone", json!(null)),
            RawCandidate::new("last_name", "   "),
        ];
        assert!(CandidateFields::from_raw(&raw).is_empty());
    }

    #[test]
    fn first_value_for_a_field_wins() {
        let raw = vec![
            RawCandidate::new("make", "Toyota"),
            RawCandidate::new("vehicle_make", "Honda"),
        ];
        let candidates = CandidateFields::from_raw(&raw);
        assert_eq!(candidates.get(LeadField::VehicleMake), Some("Toyota"));
    }

    #[test]
    fn iter_follows_collection_order() {
        let mut candidates = CandidateFields::default();
        candidates.set(LeadField::VehicleYear, "2019");
        candidates.set(LeadField::FirstName, "John");
        let fields: Vec<_> = candidates.iter().map(|(f, _)| f).collect();
        assert_eq!(fields, vec![LeadField::FirstName, LeadField::VehicleYear]);
    }
}
