use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::models::PhoneNumber;

/// Per-conversation key/value context consumed by template rendering.
/// Values are JSON primitives (string/number/bool/null); anything else is
/// carried along but never substituted into a template.
pub type Context = HashMap<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    Idle,
    WaitingForName,
    WaitingForDate,
    WaitingForTime,
    WaitingForService,
    ProcessingOrder,
    Confirmed,
    Cancelled,
}

impl ConversationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationState::Idle => "idle",
            ConversationState::WaitingForName => "waiting_for_name",
            ConversationState::WaitingForDate => "waiting_for_date",
            ConversationState::WaitingForTime => "waiting_for_time",
            ConversationState::WaitingForService => "waiting_for_service",
            ConversationState::ProcessingOrder => "processing_order",
            ConversationState::Confirmed => "confirmed",
            ConversationState::Cancelled => "cancelled",
        }
    }

    /// Unlike trigger types, an unknown state name is an error: transitions
    /// outside the fixed set must fail.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "idle" => Ok(ConversationState::Idle),
            "waiting_for_name" => Ok(ConversationState::WaitingForName),
            "waiting_for_date" => Ok(ConversationState::WaitingForDate),
            "waiting_for_time" => Ok(ConversationState::WaitingForTime),
            "waiting_for_service" => Ok(ConversationState::WaitingForService),
            "processing_order" => Ok(ConversationState::ProcessingOrder),
            "confirmed" => Ok(ConversationState::Confirmed),
            "cancelled" => Ok(ConversationState::Cancelled),
            _ => Err(DomainError::InvalidState(s.to_string())),
        }
    }
}

/// One active conversation per phone number. Created lazily on first
/// interaction, mutated on every one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub phone: PhoneNumber,
    pub state: ConversationState,
    pub context: Context,
    pub last_activity: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

impl Conversation {
    pub fn new(id: String, phone: PhoneNumber, now: NaiveDateTime) -> Self {
        Self {
            id,
            phone,
            state: ConversationState::Idle,
            context: Context::new(),
            last_activity: now,
            created_at: now,
        }
    }

    pub fn set_state(&mut self, state: ConversationState, now: NaiveDateTime) {
        self.state = state;
        self.last_activity = now;
    }

    /// Shallow merge: incoming keys overwrite existing ones.
    pub fn update_context(&mut self, context: Context, now: NaiveDateTime) {
        self.context.extend(context);
        self.last_activity = now;
    }

    pub fn set_context_value(
        &mut self,
        key: impl Into<String>,
        value: serde_json::Value,
        now: NaiveDateTime,
    ) {
        self.context.insert(key.into(), value);
        self.last_activity = now;
    }

    pub fn context_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.context.get(key)
    }

    pub fn reset(&mut self, now: NaiveDateTime) {
        self.state = ConversationState::Idle;
        self.context.clear();
        self.last_activity = now;
    }

    pub fn is_idle(&self) -> bool {
        self.state == ConversationState::Idle
    }

    pub fn is_active(&self) -> bool {
        !self.is_idle()
    }
}
