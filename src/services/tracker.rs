use std::sync::Arc;

use crate::models::{Context, Conversation, ConversationState, PhoneNumber};
use crate::store::{Clock, ConversationStore};

/// Per-phone-number conversation state and context with get-or-create
/// semantics. Every mutation bumps last-activity and persists
/// synchronously; there is no write buffering.
///
/// Concurrent mutations for the same phone number are last-write-wins;
/// callers needing strict ordering of rapid back-to-back messages must
/// serialize above this layer.
#[derive(Clone)]
pub struct ConversationTracker {
    conversations: Arc<dyn ConversationStore>,
    clock: Arc<dyn Clock>,
}

impl ConversationTracker {
    pub fn new(conversations: Arc<dyn ConversationStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            conversations,
            clock,
        }
    }

    pub fn get_or_create(&self, phone: &PhoneNumber) -> anyhow::Result<Conversation> {
        if let Some(conversation) = self.conversations.find_by_phone(phone)? {
            return Ok(conversation);
        }

        let conversation = Conversation::new(
            uuid::Uuid::new_v4().to_string(),
            phone.clone(),
            self.clock.now(),
        );
        self.conversations.save(&conversation)?;
        Ok(conversation)
    }

    pub fn set_state(
        &self,
        phone: &PhoneNumber,
        state: ConversationState,
        context: Option<Context>,
    ) -> anyhow::Result<()> {
        let mut conversation = self.get_or_create(phone)?;
        let now = self.clock.now();
        conversation.set_state(state, now);

        if let Some(context) = context {
            if !context.is_empty() {
                conversation.update_context(context, now);
            }
        }

        self.conversations.save(&conversation)
    }

    pub fn update_context(&self, phone: &PhoneNumber, context: Context) -> anyhow::Result<()> {
        let mut conversation = self.get_or_create(phone)?;
        conversation.update_context(context, self.clock.now());
        self.conversations.save(&conversation)
    }

    pub fn set_context_value(
        &self,
        phone: &PhoneNumber,
        key: &str,
        value: serde_json::Value,
    ) -> anyhow::Result<()> {
        let mut conversation = self.get_or_create(phone)?;
        conversation.set_context_value(key, value, self.clock.now());
        self.conversations.save(&conversation)
    }

    /// No conversation means no value; this one does not create.
    pub fn context_value(
        &self,
        phone: &PhoneNumber,
        key: &str,
    ) -> anyhow::Result<Option<serde_json::Value>> {
        Ok(self
            .conversations
            .find_by_phone(phone)?
            .and_then(|conversation| conversation.context_value(key).cloned()))
    }

    pub fn current_state(&self, phone: &PhoneNumber) -> anyhow::Result<ConversationState> {
        Ok(self
            .conversations
            .find_by_phone(phone)?
            .map(|conversation| conversation.state)
            .unwrap_or(ConversationState::Idle))
    }

    /// No-op when no conversation exists for the number.
    pub fn reset(&self, phone: &PhoneNumber) -> anyhow::Result<()> {
        if let Some(mut conversation) = self.conversations.find_by_phone(phone)? {
            conversation.reset(self.clock.now());
            self.conversations.save(&conversation)?;
        }
        Ok(())
    }

    pub fn is_in_state(
        &self,
        phone: &PhoneNumber,
        state: ConversationState,
    ) -> anyhow::Result<bool> {
        Ok(self.current_state(phone)? == state)
    }

    pub fn has_active_conversation(&self, phone: &PhoneNumber) -> anyhow::Result<bool> {
        Ok(self.current_state(phone)? != ConversationState::Idle)
    }
}
