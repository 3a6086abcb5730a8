//! Outbound SMS: the message type, the transport seam, and the Twilio
//! implementation.

pub mod chunker;
pub mod twilio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::phone::normalize_phone;

pub use twilio::TwilioTransport;

/// One outbound text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub to: String,
    pub from: String,
    pub body: String,
}

impl Message {
    /// Build a message with both numbers normalized.
    pub fn new(to: &str, from: &str, body: impl Into<String>) -> Self {
        Self {
            to: normalize_phone(to),
            from: normalize_phone(from),
            body: body.into(),
        }
    }
}

/// Delivers a message to its recipient.
///
/// Returns the provider's HTTP status on success.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send(&self, message: &Message) -> Result<u16, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalizes_numbers() {
        let m = Message::new("+1 (706) 781-5146", "1-706-555-0000", "hi");
        assert_eq!(m.to, "7067815146");
        assert_eq!(m.from, "7065550000");
    }
}
