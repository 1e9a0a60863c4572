//! Normalizer - deterministic per-field cleanup.
//!
//! Every rule is idempotent: normalizing an already normalized value
//! returns it unchanged. Values a rule cannot canonicalize pass through
//! trimmed so the validator can name the problem.

use super::LeadField;

/// Bare provider names that get `.com` appended when spoken without a TLD.
const COMMON_EMAIL_PROVIDERS: &[&str] = &[
    "gmail",
    "yahoo",
    "hotmail",
    "outlook",
    "icloud",
    "aol",
    "protonmail",
    "msn",
];

/// Oldest vehicle year accepted anywhere in intake.
pub const MIN_VEHICLE_YEAR: i32 = 1980;

/// Canonicalizes raw field values.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    reference_year: i32,
}

impl Normalizer {
    /// `reference_year` bounds vehicle years at `reference_year + 1`.
    pub fn new(reference_year: i32) -> Self {
        Self { reference_year }
    }

    pub fn normalize(&self, field: LeadField, raw: &str) -> String {
        match field {
            LeadField::Phone => normalize_phone(raw),
            LeadField::Email => normalize_email(raw),
            LeadField::VehicleYear => self.normalize_year(raw),
            _ => raw.trim().to_string(),
        }
    }

    fn normalize_year(&self, raw: &str) -> String {
        let max = self.reference_year + 1;
        raw.split(|c: char| !c.is_ascii_digit())
            .filter(|run| run.len() == 4)
            .filter_map(|run| run.parse::<i32>().ok())
            .find(|year| (MIN_VEHICLE_YEAR..=max).contains(year))
            .map(|year| year.to_string())
            .unwrap_or_else(|| raw.trim().to_string())
    }
}

/// Digits of a phone number with a leading country `1` dropped from 11-digit input.
pub fn national_digits(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.strip_prefix('1') {
        Some(rest) if digits.len() == 11 => rest.to_string(),
        _ => digits,
    }
}

/// `(NPA) NXX-XXXX` for ten national digits, otherwise the trimmed input.
pub fn normalize_phone(raw: &str) -> String {
    let digits = national_digits(raw);
    if digits.len() != 10 {
        return raw.trim().to_string();
    }
    format!("({}) {}-{}", &digits[0..3], &digits[3..6], &digits[6..10])
}

pub fn normalize_email(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let joined = transcribe_spoken_email(&lowered);
    complete_provider_domain(&joined)
}

/// Turns "john dot doe at gmail dot com" into "john.doe@gmail.com".
///
/// Only interior tokens are read as symbols so a local part such as "dot"
/// on its own survives.
fn transcribe_spoken_email(text: &str) -> String {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let has_at = text.contains('@');
    let last = tokens.len().saturating_sub(1);

    tokens
        .iter()
        .enumerate()
        .map(|(i, token)| {
            if i == 0 || i == last {
                return *token;
            }
            match *token {
                "at" if !has_at => "@",
                "dot" => ".",
                "dash" | "hyphen" => "-",
                "underscore" => "_",
                other => other,
            }
        })
        .collect()
}

fn complete_provider_domain(email: &str) -> String {
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return email.to_string();
    };
    if COMMON_EMAIL_PROVIDERS.contains(&domain) {
        format!("{}@{}.com", local, domain)
    } else {
        email.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn normalizer() -> Normalizer {
        Normalizer::new(2025)
    }

    #[test]
    fn phone_dashes_become_canonical() {
        assert_eq!(normalize_phone("555-223-4567"), "(555) 223-4567");
    }

    #[test]
    fn phone_country_code_is_dropped() {
        assert_eq!(normalize_phone("+1 555 223 4567"), "(555) 223-4567");
    }

    #[test]
    fn phone_with_wrong_length_passes_through_trimmed() {
        assert_eq!(normalize_phone("  555-22-4567 "), "555-22-4567");
    }

    #[test]
    fn eleven_digits_without_country_code_pass_through() {
        assert_eq!(normalize_phone("25552234567"), "25552234567");
    }

    #[test]
    fn email_is_lowercased_and_trimmed() {
        assert_eq!(normalize_email("  John@Example.COM "), "john@example.com");
    }

    #[test]
    fn spoken_provider_gets_dot_com() {
        assert_eq!(normalize_email("john at gmail"), "john@gmail.com");
    }

    #[test]
    fn spoken_email_is_transcribed() {
        assert_eq!(
            normalize_email("John dot Doe at example dot com"),
            "john.doe@example.com"
        );
        assert_eq!(
            normalize_email("mary underscore ann dash b at yahoo"),
            "mary_ann-b@yahoo.com"
        );
    }

    #[test]
    fn provider_with_tld_is_untouched() {
        assert_eq!(normalize_email("jane@outlook.com"), "jane@outlook.com");
    }

    #[test]
    fn unknown_bare_domain_is_untouched() {
        assert_eq!(normalize_email("jane@company"), "jane@company");
    }

    #[test]
    fn year_extracted_from_phrase() {
        assert_eq!(normalizer().normalize(LeadField::VehicleYear, "it's a 2019 model"), "2019");
    }

    #[test]
    fn year_skips_out_of_range_runs() {
        assert_eq!(normalizer().normalize(LeadField::VehicleYear, "1975 or 2001"), "2001");
        assert_eq!(normalizer().normalize(LeadField::VehicleYear, " 2030 "), "2030");
    }

    #[test]
    fn year_ignores_longer_digit_runs() {
        assert_eq!(normalizer().normalize(LeadField::VehicleYear, "20190"), "20190");
    }

    #[test]
    fn year_accepts_next_model_year() {
        assert_eq!(normalizer().normalize(LeadField::VehicleYear, "2026"), "2026");
    }

    #[test]
    fn other_fields_are_trimmed() {
        assert_eq!(normalizer().normalize(LeadField::FirstName, "  John "), "John");
    }

    proptest! {
        #[test]
        fn phone_normalization_is_idempotent(raw in "[0-9 ()+.-]{0,20}") {
            let once = normalize_phone(&raw);
            prop_assert_eq!(normalize_phone(&once), once);
        }

        #[test]
        fn email_normalization_is_idempotent(raw in "[a-zA-Z0-9@._ -]{0,30}") {
            let once = normalize_email(&raw);
            prop_assert_eq!(normalize_email(&once), once);
        }

        #[test]
        fn spoken_email_normalization_is_idempotent(
            local in "[a-z]{1,8}",
            provider in prop::sample::select(COMMON_EMAIL_PROVIDERS.to_vec()),
        ) {
            let once = normalize_email(&format!("{} at {}", local, provider));
            prop_assert_eq!(normalize_email(&once), once.clone());
            prop_assert_eq!(once, format!("{}@{}.com", local, provider));
        }

        #[test]
        fn year_normalization_is_idempotent(raw in "[a-z0-9 ]{0,16}") {
            let n = normalizer();
            let once = n.normalize(LeadField::VehicleYear, &raw);
            prop_assert_eq!(n.normalize(LeadField::VehicleYear, &once), once);
        }

        #[test]
        fn plain_field_normalization_is_idempotent(raw in "\\PC{0,20}") {
            let n = normalizer();
            let once = n.normalize(LeadField::VehicleModel, &raw);
            prop_assert_eq!(n.normalize(LeadField::VehicleModel, &once), once);
        }
    }
}
