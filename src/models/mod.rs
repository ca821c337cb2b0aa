pub mod analytics;
pub mod conversation;
pub mod hours;
pub mod incoming;
pub mod outbound;
pub mod phone;
pub mod rule;
pub mod sid;

pub use analytics::MessageAnalytics;
pub use conversation::{Context, Conversation, ConversationState};
pub use hours::BusinessHours;
pub use incoming::IncomingMessage;
pub use outbound::{DeliveryStatus, OutboundMessage};
pub use phone::PhoneNumber;
pub use rule::{KeywordRule, TriggerType};
pub use sid::MessageSid;

/// Twilio caps WhatsApp message bodies at 1600 characters; everything that
/// carries message content enforces the same limit.
pub const MAX_CONTENT_LEN: usize = 1600;
