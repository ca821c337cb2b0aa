use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::models::{PhoneNumber, MAX_CONTENT_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "sent" => DeliveryStatus::Sent,
            "failed" => DeliveryStatus::Failed,
            _ => DeliveryStatus::Pending,
        }
    }
}

/// An outbound reply. Persisted as pending before the transport call, then
/// marked sent or failed. Sent is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub id: String,
    pub to_phone: PhoneNumber,
    pub content: String,
    pub status: DeliveryStatus,
    pub provider_sid: Option<String>,
    pub created_at: NaiveDateTime,
    pub sent_at: Option<NaiveDateTime>,
}

impl OutboundMessage {
    pub fn new(
        id: String,
        to_phone: PhoneNumber,
        content: &str,
        now: NaiveDateTime,
    ) -> Result<Self, DomainError> {
        let trimmed = content.trim();

        if trimmed.is_empty() {
            return Err(DomainError::EmptyContent);
        }
        if trimmed.len() > MAX_CONTENT_LEN {
            return Err(DomainError::ContentTooLong(MAX_CONTENT_LEN));
        }

        Ok(Self {
            id,
            to_phone,
            content: trimmed.to_string(),
            status: DeliveryStatus::Pending,
            provider_sid: None,
            created_at: now,
            sent_at: None,
        })
    }

    pub fn mark_sent(&mut self, provider_sid: String, now: NaiveDateTime) -> Result<(), DomainError> {
        if self.status == DeliveryStatus::Sent {
            return Err(DomainError::AlreadySent);
        }

        self.status = DeliveryStatus::Sent;
        self.provider_sid = Some(provider_sid);
        self.sent_at = Some(now);
        Ok(())
    }

    pub fn mark_failed(&mut self) -> Result<(), DomainError> {
        if self.status == DeliveryStatus::Sent {
            return Err(DomainError::SentIsTerminal);
        }

        self.status = DeliveryStatus::Failed;
        Ok(())
    }

    pub fn is_sent(&self) -> bool {
        self.status == DeliveryStatus::Sent
    }

    pub fn has_failed(&self) -> bool {
        self.status == DeliveryStatus::Failed
    }
}
