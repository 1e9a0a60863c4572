//! LeadField enum naming the eight required lead fields.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// A required lead field. Declaration order is collection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadField {
    FirstName,
    LastName,
    ResidenceState,
    Phone,
    Email,
    VehicleMake,
    VehicleModel,
    VehicleYear,
}

impl LeadField {
    /// Returns all fields in collection order.
    pub fn all() -> &'static [LeadField] {
        &[
            LeadField::FirstName,
            LeadField::LastName,
            LeadField::ResidenceState,
            LeadField::Phone,
            LeadField::Email,
            LeadField::VehicleMake,
            LeadField::VehicleModel,
            LeadField::VehicleYear,
        ]
    }

    /// Returns the 0-based position of this field in collection order.
    pub fn order_index(&self) -> usize {
        match self {
            LeadField::FirstName => 0,
            LeadField::LastName => 1,
            LeadField::ResidenceState => 2,
            LeadField::Phone => 3,
            LeadField::Email => 4,
            LeadField::VehicleMake => 5,
            LeadField::VehicleModel => 6,
            LeadField::VehicleYear => 7,
        }
    }

    /// Stable snake_case key used in storage and extractor payloads.
    pub fn key(&self) -> &'static str {
        match self {
            LeadField::FirstName => "first_name",
            LeadField::LastName => "last_name",
            LeadField::ResidenceState => "residence_state",
            LeadField::Phone => "phone",
            LeadField::Email => "email",
            LeadField::VehicleMake => "vehicle_make",
            LeadField::VehicleModel => "vehicle_model",
            LeadField::VehicleYear => "vehicle_year",
        }
    }

    /// Lower-case phrase for use inside sentences.
    pub fn label(&self) -> &'static str {
        match self {
            LeadField::FirstName => "first name",
            LeadField::LastName => "last name",
            LeadField::ResidenceState => "state",
            LeadField::Phone => "phone number",
            LeadField::Email => "email address",
            LeadField::VehicleMake => "vehicle make",
            LeadField::VehicleModel => "vehicle model",
            LeadField::VehicleYear => "vehicle year",
        }
    }

    /// The question asked to collect this field.
    pub fn question(&self) -> &'static str {
        match self {
            LeadField::FirstName => "What is your first name?",
            LeadField::LastName => "What is your last name?",
            LeadField::ResidenceState => "What state do you live in?",
            LeadField::Phone => "What is the best phone number to reach you?",
            LeadField::Email => "What is your email address?",
            LeadField::VehicleMake => "What is the make of the vehicle?",
            LeadField::VehicleModel => "What is the model of the vehicle?",
            LeadField::VehicleYear => "What is the year of the vehicle?",
        }
    }

    /// Fields read back to the caller before they are committed.
    pub fn requires_confirmation(&self) -> bool {
        matches!(self, LeadField::Phone | LeadField::Email)
    }

    /// Resolves a key or a common alias an extractor might use.
    pub fn from_key(key: &str) -> Option<LeadField> {
        let normalized = key.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        let field = match normalized.as_str() {
            "first_name" | "firstname" | "given_name" => LeadField::FirstName,
            "last_name" | "lastname" | "surname" | "family_name" => LeadField::LastName,
            "residence_state" | "state" => LeadField::ResidenceState,
            "phone" | "phone_number" | "telephone" => LeadField::Phone,
            "email" | "email_address" => LeadField::Email,
            "vehicle_make" | "make" => LeadField::VehicleMake,
            "vehicle_model" | "model" => LeadField::VehicleModel,
            "vehicle_year" | "year" => LeadField::VehicleYear,
            _ => return None,
        };
        Some(field)
    }
}

impl fmt::Display for LeadField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for LeadField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LeadField::from_key(s)
            .ok_or_else(|| ValidationError::invalid_format("field", format!("unknown lead field '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_returns_8_fields() {
        assert_eq!(LeadField::all().len(), 8);
    }

    #[test]
    fn order_index_matches_all() {
        for (i, field) in LeadField::all().iter().enumerate() {
            assert_eq!(field.order_index(), i);
        }
    }

    #[test]
    fn derived_ord_follows_collection_order() {
        let mut sorted = LeadField::all().to_vec();
        sorted.sort();
        assert_eq!(sorted, LeadField::all());
    }

    #[test]
    fn only_contact_fields_need_confirmation() {
        let confirmable: Vec<_> = LeadField::all()
            .iter()
            .filter(|f| f.requires_confirmation())
            .collect();
        assert_eq!(confirmable, vec![&LeadField::Phone, &LeadField::Email]);
    }

    #[test]
    fn from_key_accepts_aliases() {
        assert_eq!(LeadField::from_key("Phone Number"), Some(LeadField::Phone));
        assert_eq!(LeadField::from_key("make"), Some(LeadField::VehicleMake));
        assert_eq!(LeadField::from_key("state"), Some(LeadField::ResidenceState));
        assert_eq!(LeadField::from_key("favorite_color"), None);
    }

    #[test]
    fn key_round_trips() {
        for field in LeadField::all() {
            assert_eq!(field.key().parse::<LeadField>().unwrap(), *field);
        }
    }

    #[test]
    fn serializes_as_key() {
        let json = serde_json::to_string(&LeadField::VehicleYear).unwrap();
        assert_eq!(json, "\"vehicle_year\"");
    }
}
