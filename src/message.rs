//! Inbound chat message record.
//!
//! Built once at the Telegram boundary so nothing past `main.rs` touches teloxide types.

/// A text message received from a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Chat ID where this message was sent (negative = group, positive = DM).
    pub chat_id: i64,
    pub sender_id: i64,
    pub sender_first_name: String,
    pub sender_last_name: Option<String>,
    pub text: String,
}

impl InboundMessage {
    /// Human-readable sender label: "First Last", or just "First".
    pub fn display_name(&self) -> String {
        match self.sender_last_name.as_deref().map(str::trim) {
            Some(last) if !last.is_empty() => format!("{} {}", self.sender_first_name, last),
            _ => self.sender_first_name.clone(),
        }
    }
}
