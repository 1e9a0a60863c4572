//! Conversation channel.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

/// Transport a conversation arrives on. Drives prompt wording only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Text,
    Voice,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Text => "text",
            Channel::Voice => "voice",
        }
    }

    pub fn is_voice(&self) -> bool {
        matches!(self, Channel::Voice)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Channel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "sms" => Ok(Channel::Text),
            "voice" | "call" => Ok(Channel::Voice),
            other => Err(ValidationError::invalid_format(
                "channel",
                format!("expected 'text' or 'voice', got '{}'", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases() {
        assert_eq!("SMS".parse::<Channel>().unwrap(), Channel::Text);
        assert_eq!("voice".parse::<Channel>().unwrap(), Channel::Voice);
        assert!("fax".parse::<Channel>().is_err());
    }

    #[test]
    fn displays_lowercase() {
        assert_eq!(Channel::Voice.to_string(), "voice");
    }
}
