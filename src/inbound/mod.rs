//! Inbound SMS replies: parsing, classification, and routing.

pub mod classify;
pub mod router;

use serde::{Deserialize, Serialize};

use crate::phone::normalize_phone;

pub use classify::{InboundIntent, classify};
pub use router::{Disposition, InboundRouter};

/// A reply delivered by the SMS provider's webhook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct InboundMessage {
    pub message_sid: String,
    pub account_sid: String,
    pub from: String,
    pub to: String,
    pub body: String,
}

impl InboundMessage {
    /// Normalize both phone numbers; the body is kept verbatim.
    pub fn normalized(mut self) -> Self {
        self.from = normalize_phone(&self.from);
        self.to = normalize_phone(&self.to);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_provider_field_names() {
        let message: InboundMessage = serde_json::from_str(
            r#"{"MessageSid":"SM1","AccountSid":"AC1","From":"+17067815146","To":"+1 706 555 0000","Body":" 42 "}"#,
        )
        .unwrap();
        let message = message.normalized();
        assert_eq!(message.from, "7067815146");
        assert_eq!(message.to, "7065550000");
        assert_eq!(message.body, " 42 ");
    }

    #[test]
    fn missing_fields_default_empty() {
        let message: InboundMessage = serde_json::from_str("{}").unwrap();
        assert_eq!(message, InboundMessage::default());
    }
}
