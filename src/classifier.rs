//! Turns chat text into vote intents.

use regex::Regex;
use tracing::debug;

use crate::message::InboundMessage;

/// What a message means for the poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Coming, possibly late by `delay_minutes`.
    Yes { delay_minutes: u32 },
    /// Not coming.
    No,
}

/// Classifies messages from the single authorized chat.
pub struct Classifier {
    chat_id: Option<i64>,
    max_delay: u32,
    delay_re: Regex,
}

impl Classifier {
    /// `chat_id = None` authorizes no chat at all.
    pub fn new(chat_id: Option<i64>, max_delay: u32) -> Self {
        Self {
            chat_id,
            max_delay,
            delay_re: Regex::new(r"^\s*\+\s*([0-9]+)").expect("delay pattern is valid"),
        }
    }

    pub fn is_authorized(&self, chat_id: i64) -> bool {
        self.chat_id == Some(chat_id)
    }

    /// Returns `None` for anything that is not a vote.
    pub fn classify(&self, msg: &InboundMessage) -> Option<Intent> {
        if !self.is_authorized(msg.chat_id) {
            return None;
        }
        self.classify_text(&msg.text)
    }

    pub fn classify_text(&self, text: &str) -> Option<Intent> {
        match text.trim() {
            "-" => return Some(Intent::No),
            "+" => return Some(Intent::Yes { delay_minutes: 0 }),
            _ => {}
        }

        let caps = self.delay_re.captures(text)?;
        // Digit runs too long for u32 are not votes.
        let delay_minutes: u32 = caps[1].parse().ok()?;
        if delay_minutes > self.max_delay {
            // max_delay is advisory only.
            debug!("Delay {delay_minutes} exceeds max_delay {}", self.max_delay);
        }
        Some(Intent::Yes { delay_minutes })
    }
}
