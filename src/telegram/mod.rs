//! Telegram Bot API gateway
//!
//! Inbound updates arrive by webhook and go to [`TelegramBot`]; outbound
//! messages go through the [`TelegramApi`] capability.

pub mod bot;
pub mod client;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use bot::TelegramBot;
pub use client::TelegramClient;

/// Update envelope pushed to the webhook
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub edited_message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: Option<String>,
}

/// `getMe` result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotInfo {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    pub username: Option<String>,
}

/// Outbound calls to the Bot API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelegramApi: Send + Sync {
    /// Send an HTML-formatted message to a chat id or `@username`
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<()>;

    /// Send `text` verbatim, without any parse mode
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()>;

    async fn get_me(&self) -> Result<BotInfo>;
}

/// Escape text for interpolation into an HTML-mode message
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<i>0xabc</i> & co"), "&lt;i&gt;0xabc&lt;/i&gt; &amp; co");
        assert_eq!(escape_html("0x1234...cdef"), "0x1234...cdef");
    }
}
