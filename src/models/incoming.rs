use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::models::{MessageSid, PhoneNumber, MAX_CONTENT_LEN};

/// An inbound webhook message as recorded on receipt. The provider SID is
/// the global dedup key: at most one record exists per SID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub id: String,
    pub from_phone: PhoneNumber,
    pub content: String,
    pub provider_sid: MessageSid,
    pub processed: bool,
    pub response_message_id: Option<String>,
    pub created_at: NaiveDateTime,
}

impl IncomingMessage {
    pub fn new(
        id: String,
        from_phone: PhoneNumber,
        content: &str,
        provider_sid: MessageSid,
        now: NaiveDateTime,
    ) -> Result<Self, DomainError> {
        if content.trim().is_empty() {
            return Err(DomainError::EmptyContent);
        }
        if content.len() > MAX_CONTENT_LEN {
            return Err(DomainError::ContentTooLong(MAX_CONTENT_LEN));
        }

        Ok(Self {
            id,
            from_phone,
            content: content.to_string(),
            provider_sid,
            processed: false,
            response_message_id: None,
            created_at: now,
        })
    }

    /// Set once the reply has actually gone out.
    pub fn mark_processed(&mut self, response_message_id: String) {
        self.processed = true;
        self.response_message_id = Some(response_message_id);
    }
}
