use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

static SID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^SM[a-fA-F0-9]{32}$").unwrap());

/// Provider-assigned message SID (`SM` + 32 hex chars). Unique per inbound
/// message and used as the webhook dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageSid(String);

impl MessageSid {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(DomainError::InvalidSid("SID cannot be empty".to_string()));
        }

        if !SID_RE.is_match(trimmed) {
            return Err(DomainError::InvalidSid(format!(
                "expected SM followed by 32 hex characters, got {raw:?}"
            )));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageSid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for MessageSid {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        MessageSid::parse(&value)
    }
}

impl From<MessageSid> for String {
    fn from(sid: MessageSid) -> Self {
        sid.0
    }
}
