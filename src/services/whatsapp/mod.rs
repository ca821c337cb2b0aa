pub mod twilio;

use async_trait::async_trait;

use crate::models::PhoneNumber;

/// What the transport reported for one send attempt. Failures are values,
/// not errors: the caller decides whether a failed delivery fails its own
/// operation.
#[derive(Debug, Clone)]
pub enum SendOutcome {
    Sent { sid: String },
    Failed { error: String },
}

#[async_trait]
pub trait WhatsAppProvider: Send + Sync {
    async fn send_message(&self, to: &PhoneNumber, body: &str) -> SendOutcome;
    async fn is_available(&self) -> bool;
}
