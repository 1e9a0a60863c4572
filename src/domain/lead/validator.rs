//! Validator - per-field validity and required-field completeness.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::normalizer::{national_digits, MIN_VEHICLE_YEAR};
use super::{LeadField, LeadFields};
use crate::domain::foundation::Channel;

/// Why a field value cannot be accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldIssue {
    Missing { field: LeadField },
    Malformed { field: LeadField, reason: MalformedReason },
}

impl FieldIssue {
    pub fn field(&self) -> LeadField {
        match self {
            FieldIssue::Missing { field } | FieldIssue::Malformed { field, .. } => *field,
        }
    }

    /// Plain-language explanation for the channel, never a raw code.
    pub fn describe(&self, channel: Channel) -> String {
        match self {
            FieldIssue::Missing { field } => format!("I didn't catch your {}", field.label()),
            FieldIssue::Malformed { reason, .. } => reason.describe(channel),
        }
    }
}

/// Specific malformation found by a field rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    PhoneDigitCount { digits: usize },
    PhoneAreaCode,
    PhoneExchange,
    PhoneRepeatedDigits,
    EmailMissingAt,
    EmailMultipleAt,
    EmailEmptyLocalPart,
    EmailWhitespace,
    EmailDomainMissingDot,
    EmailTopLevelDomain,
    YearNotANumber,
    YearOutOfRange { min: i32, max: i32 },
}

impl MalformedReason {
    pub fn describe(&self, channel: Channel) -> String {
        let voice = channel.is_voice();
        match self {
            MalformedReason::PhoneDigitCount { digits } => format!(
                "a phone number needs 10 digits including the area code, and I got {}",
                digits
            ),
            MalformedReason::PhoneAreaCode => {
                "that area code doesn't look right, since area codes can't start with 0 or 1".to_string()
            }
            MalformedReason::PhoneExchange => {
                "that number doesn't look right, since the three digits after the area code can't start with 0 or 1".to_string()
            }
            MalformedReason::PhoneRepeatedDigits => {
                "that doesn't look like a real phone number".to_string()
            }
            MalformedReason::EmailMissingAt if voice => {
                "I didn't hear the 'at' symbol in your email address".to_string()
            }
            MalformedReason::EmailMissingAt => {
                "the email address needs an @ sign, like name@example.com".to_string()
            }
            MalformedReason::EmailMultipleAt if voice => {
                "I heard 'at' more than once in that email address".to_string()
            }
            MalformedReason::EmailMultipleAt => {
                "the email address should have only one @ sign".to_string()
            }
            MalformedReason::EmailEmptyLocalPart if voice => {
                "I didn't hear anything before the 'at' in your email address".to_string()
            }
            MalformedReason::EmailEmptyLocalPart => {
                "the email address needs a name before the @ sign".to_string()
            }
            MalformedReason::EmailWhitespace => {
                "the email address can't contain spaces".to_string()
            }
            MalformedReason::EmailDomainMissingDot if voice => {
                "the email domain needs a 'dot' like 'gmail dot com'".to_string()
            }
            MalformedReason::EmailDomainMissingDot => {
                "the email domain needs a dot, like example.com".to_string()
            }
            MalformedReason::EmailTopLevelDomain if voice => {
                "the email should end with something like 'dot com' or 'dot net'".to_string()
            }
            MalformedReason::EmailTopLevelDomain => {
                "the email should end with something like .com or .net".to_string()
            }
            MalformedReason::YearNotANumber => {
                "the vehicle year should be a four digit year, like 2019".to_string()
            }
            MalformedReason::YearOutOfRange { min, max } => {
                format!("the vehicle year needs to be between {} and {}", min, max)
            }
        }
    }
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe(Channel::Text))
    }
}

/// A value that passed the rules for its field.
///
/// Only `Validator::accept` produces one, which is what keeps unvalidated
/// values out of a session's collected fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedValue {
    field: LeadField,
    value: String,
}

impl ValidatedValue {
    pub fn field(&self) -> LeadField {
        self.field
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn into_value(self) -> String {
        self.value
    }
}

/// Field validity rules. Expects values that already went through the normalizer.
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    reference_year: i32,
}

impl Validator {
    pub fn new(reference_year: i32) -> Self {
        Self { reference_year }
    }

    pub fn validate(&self, field: LeadField, value: &str) -> Result<(), FieldIssue> {
        let value = value.trim();
        if value.is_empty() {
            return Err(FieldIssue::Missing { field });
        }
        let reason = match field {
            LeadField::Phone => validate_phone(value),
            LeadField::Email => validate_email(value),
            LeadField::VehicleYear => self.validate_year(value),
            _ => Ok(()),
        };
        reason.map_err(|reason| FieldIssue::Malformed { field, reason })
    }

    /// Validates and wraps a value for committing.
    pub fn accept(&self, field: LeadField, value: &str) -> Result<ValidatedValue, FieldIssue> {
        self.validate(field, value)?;
        Ok(ValidatedValue {
            field,
            value: value.trim().to_string(),
        })
    }

    /// First required field not yet collected, as a `Missing` issue.
    pub fn check_complete(&self, fields: &LeadFields) -> Result<(), FieldIssue> {
        match fields.first_missing() {
            Some(field) => Err(FieldIssue::Missing { field }),
            None => Ok(()),
        }
    }

    fn validate_year(&self, value: &str) -> Result<(), MalformedReason> {
        let year: i32 = value.parse().map_err(|_| MalformedReason::YearNotANumber)?;
        let max = self.reference_year + 1;
        if !(MIN_VEHICLE_YEAR..=max).contains(&year) {
            return Err(MalformedReason::YearOutOfRange {
                min: MIN_VEHICLE_YEAR,
                max,
            });
        }
        Ok(())
    }
}

fn validate_phone(value: &str) -> Result<(), MalformedReason> {
    let digits = national_digits(value);
    if digits.len() != 10 {
        return Err(MalformedReason::PhoneDigitCount {
            digits: digits.len(),
        });
    }
    let bytes = digits.as_bytes();
    if matches!(bytes[0], b'0' | b'1') {
        return Err(MalformedReason::PhoneAreaCode);
    }
    if matches!(bytes[3], b'0' | b'1') && &digits[0..3] != "555" {
        return Err(MalformedReason::PhoneExchange);
    }
    if bytes.iter().all(|b| *b == bytes[0]) {
        return Err(MalformedReason::PhoneRepeatedDigits);
    }
    Ok(())
}

fn validate_email(value: &str) -> Result<(), MalformedReason> {
    if value.chars().any(char::is_whitespace) {
        return Err(MalformedReason::EmailWhitespace);
    }
    let mut parts = value.split('@');
    let local = parts.next().unwrap_or_default();
    let Some(domain) = parts.next() else {
        return Err(MalformedReason::EmailMissingAt);
    };
    if parts.next().is_some() {
        return Err(MalformedReason::EmailMultipleAt);
    }
    if local.is_empty() {
        return Err(MalformedReason::EmailEmptyLocalPart);
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(MalformedReason::EmailDomainMissingDot);
    }
    let tld = labels.last().copied().unwrap_or_default();
    if tld.len() < 2 || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(MalformedReason::EmailTopLevelDomain);
    }
    Ok(())
}
