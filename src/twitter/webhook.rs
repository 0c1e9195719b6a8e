//! Account Activity webhook payloads and CRC challenge

use super::{Tweet, TweetAction, TweetHandler};
use crate::error::{BotError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Body of `POST /api/twitter/webhook`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    pub for_user_id: Option<String>,
    #[serde(default)]
    pub tweet_create_events: Vec<TweetCreateEvent>,
}

/// v1.1 tweet object as delivered by the webhook
#[derive(Debug, Clone, Deserialize)]
pub struct TweetCreateEvent {
    pub id_str: String,
    #[serde(default)]
    pub text: String,
    pub extended_tweet: Option<ExtendedTweet>,
    pub user: EventUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtendedTweet {
    pub full_text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventUser {
    pub id_str: String,
    pub screen_name: Option<String>,
}

impl From<TweetCreateEvent> for Tweet {
    fn from(event: TweetCreateEvent) -> Self {
        Tweet {
            id: event.id_str,
            // Long tweets are truncated in `text`
            text: event.extended_tweet.map(|e| e.full_text).unwrap_or(event.text),
            author_id: event.user.id_str,
            author_username: event.user.screen_name,
        }
    }
}

/// Hand every event to `handler`, in payload order.
///
/// Stops at the first failure; events after it are not processed.
pub async fn handle_tweet_events(
    handler: &dyn TweetHandler,
    events: Vec<TweetCreateEvent>,
) -> Result<Vec<TweetAction>> {
    let mut actions = Vec::with_capacity(events.len());
    for event in events {
        let tweet = Tweet::from(event);
        tracing::debug!("Webhook tweet {} from {}", tweet.id, tweet.author_id);
        actions.push(handler.process_tweet(&tweet).await?);
    }
    Ok(actions)
}

/// `sha256=<base64 HMAC-SHA256(consumer_secret, crc_token)>`
pub fn crc_response_token(consumer_secret: &str, crc_token: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(consumer_secret.as_bytes())
        .map_err(|e| BotError::Internal(format!("Invalid HMAC key: {}", e)))?;
    mac.update(crc_token.as_bytes());
    Ok(format!("sha256={}", STANDARD.encode(mac.finalize().into_bytes())))
}
