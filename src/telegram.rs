//! Telegram client using teloxide.

use teloxide::prelude::*;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::message::InboundMessage;

/// Telegram API client.
#[derive(Clone)]
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Send plain text. Names in announcements are user-controlled, so no parse mode.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<i64, String> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .map(|msg| msg.id.0 as i64)
            .map_err(|e| {
                let msg = format!("Failed to send: {e}");
                warn!("{}", msg);
                msg
            })
    }

    /// Drain `outbox` into `chat_id` until every sender is dropped.
    ///
    /// Failed sends are logged and dropped, never retried.
    pub fn spawn_sender(self, chat_id: i64, mut outbox: mpsc::UnboundedReceiver<String>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(text) = outbox.recv().await {
                if let Ok(msg_id) = self.send_message(chat_id, &text).await {
                    info!("Sent announcement to chat {} (msg {})", chat_id, msg_id);
                }
            }
        })
    }
}

/// Convert a teloxide text message. `None` for non-text messages and anonymous senders.
pub fn to_inbound(msg: &Message) -> Option<InboundMessage> {
    let user = msg.from.as_ref()?;
    let text = msg.text()?;

    Some(InboundMessage {
        chat_id: msg.chat.id.0,
        sender_id: user.id.0 as i64,
        sender_first_name: user.first_name.clone(),
        sender_last_name: user.last_name.clone(),
        text: text.to_string(),
    })
}
