use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

static MOBILE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+573[0-9]{9}$").unwrap());

/// Validated Colombian mobile number, normalized to `+573XXXXXXXXX`.
///
/// Accepts `+57XXXXXXXXXX`, `57XXXXXXXXXX` (12 digits) and a bare national
/// `3XXXXXXXXX` (10 digits). Anything else is rejected. Twilio's
/// `whatsapp:` prefix and formatting characters are stripped before
/// validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let cleaned: String = raw
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '+')
            .collect();

        if cleaned.is_empty() {
            return Err(DomainError::InvalidPhone(
                "phone number cannot be empty".to_string(),
            ));
        }

        let normalized = if cleaned.starts_with("+57") {
            cleaned
        } else if cleaned.starts_with("57") && cleaned.len() == 12 {
            format!("+{cleaned}")
        } else if cleaned.starts_with('3') && cleaned.len() == 10 {
            format!("+57{cleaned}")
        } else {
            return Err(DomainError::InvalidPhone(format!(
                "expected a Colombian mobile number, got {raw:?}"
            )));
        };

        if normalized.len() != 13 || !MOBILE_RE.is_match(&normalized) {
            return Err(DomainError::InvalidPhone(format!(
                "not a valid Colombian mobile number: {raw:?}"
            )));
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Address form the Twilio WhatsApp API expects.
    pub fn whatsapp_format(&self) -> String {
        format!("whatsapp:{}", self.0)
    }

    /// `+57 300 123 4567`
    pub fn display_format(&self) -> String {
        format!(
            "+57 {} {} {}",
            &self.0[3..6],
            &self.0[6..9],
            &self.0[9..13]
        )
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PhoneNumber::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}
