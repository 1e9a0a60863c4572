//! Channel-aware prompt wording.
//!
//! Text prompts show values as written. Voice prompts are read aloud, so
//! phone numbers are grouped and email symbols are spelled out.

use crate::domain::foundation::Channel;
use crate::domain::lead::{national_digits, FieldIssue, LeadField};

use super::session::{CandidateSource, PendingConfirmation};

/// Renders every sentence the intake conversation says.
#[derive(Debug, Clone, Copy)]
pub struct Prompts {
    channel: Channel,
}

impl Prompts {
    pub fn for_channel(channel: Channel) -> Self {
        Self { channel }
    }

    pub fn greeting(&self) -> &'static str {
        match self.channel {
            Channel::Text => "Hi! Thanks for reaching out. I just need a few details to get you connected.",
            Channel::Voice => "Hi, thanks for calling. I just need a few details to get you connected.",
        }
    }

    pub fn question(&self, field: LeadField) -> String {
        field.question().to_string()
    }

    /// Question preceded by a short acknowledgement of the last answer.
    pub fn acknowledge_and_ask(&self, field: LeadField) -> String {
        format!("Got it. {}", field.question())
    }

    /// Read-back for a pending confirmation. Repeated verbatim on unclear replies.
    pub fn confirmation(&self, pending: &PendingConfirmation) -> String {
        let value = pending.candidate.value();
        match (pending.source, pending.field()) {
            (CandidateSource::CallerId, _) => {
                format!("Is {} the best number to reach you?", self.spoken_phone(value))
            }
            (CandidateSource::Utterance, LeadField::Phone) => match self.channel {
                Channel::Voice => format!(
                    "I heard your phone number is {}. Is that correct?",
                    self.spoken_phone(value)
                ),
                Channel::Text => format!("I have your phone number as {}. Is that correct?", value),
            },
            (CandidateSource::Utterance, LeadField::Email) => match self.channel {
                Channel::Voice => format!(
                    "I heard your email is {}. Is that correct?",
                    spell_email(value)
                ),
                Channel::Text => format!("I have your email as {}. Is that correct?", value),
            },
            (CandidateSource::Utterance, field) => match self.channel {
                Channel::Voice => format!("I heard your {} is {}. Is that correct?", field.label(), value),
                Channel::Text => format!("I have your {} as {}. Is that correct?", field.label(), value),
            },
        }
    }

    pub fn rejected(&self, field: LeadField) -> String {
        format!("Sorry about that. {}", field.question())
    }

    /// Re-prompt after a value failed validation.
    pub fn invalid(&self, issue: &FieldIssue) -> String {
        format!("Sorry, {}. {}", issue.describe(self.channel), issue.field().question())
    }

    /// Same message whatever happened to the submission.
    pub fn closing(&self) -> &'static str {
        match self.channel {
            Channel::Text => {
                "Thank you! Your info has been submitted and someone will be in touch with you soon."
            }
            Channel::Voice => {
                "Thank you! Your information has been submitted and someone will be in touch with you soon. Goodbye."
            }
        }
    }

    fn spoken_phone(&self, value: &str) -> String {
        let digits = national_digits(value);
        if self.channel.is_voice() && digits.len() == 10 {
            format!("{}, {}, {}", &digits[0..3], &digits[3..6], &digits[6..10])
        } else {
            value.to_string()
        }
    }
}

/// "john.doe@example.com" becomes "john dot doe at example dot com".
pub fn spell_email(email: &str) -> String {
    let mut spoken = String::with_capacity(email.len() + 16);
    for c in email.chars() {
        match c {
            '@' => spoken.push_str(" at "),
            '.' => spoken.push_str(" dot "),
            '-' => spoken.push_str(" dash "),
            '_' => spoken.push_str(" underscore "),
            other => spoken.push(other),
        }
    }
    spoken.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::intake::session::test_support::accepted;

    fn pending(field: LeadField, value: &str, source: CandidateSource) -> PendingConfirmation {
        PendingConfirmation::new(accepted(field, value), source)
    }

    #[test]
    fn voice_phone_readback_is_grouped() {
        let prompt = Prompts::for_channel(Channel::Voice)
            .confirmation(&pending(LeadField::Phone, "(555) 123-4567", CandidateSource::Utterance));
        assert_eq!(prompt, "I heard your phone number is 555, 123, 4567. Is that correct?");
    }

    #[test]
    fn text_phone_readback_shows_canonical_form() {
        let prompt = Prompts::for_channel(Channel::Text)
            .confirmation(&pending(LeadField::Phone, "(555) 223-4567", CandidateSource::Utterance));
        assert_eq!(prompt, "I have your phone number as (555) 223-4567. Is that correct?");
    }

    #[test]
    fn voice_email_readback_spells_symbols() {
        let prompt = Prompts::for_channel(Channel::Voice)
            .confirmation(&pending(LeadField::Email, "john@example.com", CandidateSource::Utterance));
        assert_eq!(prompt, "I heard your email is john at example dot com. Is that correct?");
    }

    #[test]
    fn caller_id_offer_wording() {
        let prompt = Prompts::for_channel(Channel::Text)
            .confirmation(&pending(LeadField::Phone, "(555) 223-4567", CandidateSource::CallerId));
        assert_eq!(prompt, "Is (555) 223-4567 the best number to reach you?");
    }

    #[test]
    fn rejected_reissues_the_question() {
        assert_eq!(
            Prompts::for_channel(Channel::Voice).rejected(LeadField::Phone),
            "Sorry about that. What is the best phone number to reach you?"
        );
    }

    #[test]
    fn voice_closing_says_goodbye() {
        assert!(Prompts::for_channel(Channel::Voice).closing().ends_with("Goodbye."));
        assert!(!Prompts::for_channel(Channel::Text).closing().contains("Goodbye"));
    }

    #[test]
    fn spell_email_handles_separators() {
        assert_eq!(spell_email("mary_ann-b@yahoo.com"), "mary underscore ann dash b at yahoo dot com");
    }

    #[test]
    fn invalid_prompt_has_no_raw_codes() {
        let issue = crate::domain::lead::Validator::new(2025)
            .validate(LeadField::Email, "john@gmail")
            .unwrap_err();
        let prompt = Prompts::for_channel(Channel::Voice).invalid(&issue);
        assert_eq!(
            prompt,
            "Sorry, the email domain needs a 'dot' like 'gmail dot com'. What is your email address?"
        );
        assert!(!prompt.contains("EMAIL"));
    }
}
