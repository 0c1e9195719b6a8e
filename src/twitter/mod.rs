//! Twitter (X) API v2 gateway
//!
//! Tweets reach the bot three ways: Account Activity webhook events, the
//! manual "process mentions" trigger and the manual "process hashtags"
//! trigger. All of them end up in [`TweetHandler::process_tweet`].

pub mod bot;
pub mod client;
pub mod oauth;
pub mod webhook;

use crate::error::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use bot::{TweetAction, TwitterBot};
pub use client::TwitterClient;
pub use oauth::OAuthFlow;

/// OAuth 2.0 user token shared between the OAuth flow and the client
pub type SharedToken = Arc<RwLock<Option<String>>>;

/// A tweet, normalised from webhook events and API v2 responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tweet {
    pub id: String,
    pub text: String,
    pub author_id: String,
    pub author_username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TwitterUser {
    pub id: String,
    pub username: String,
    pub name: Option<String>,
}

/// Twitter API calls the bot needs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TwitterApi: Send + Sync {
    /// Mentions of `user_id`, newer than `since_id`
    async fn mentions(&self, user_id: &str, since_id: Option<String>) -> Result<Vec<Tweet>>;

    /// Recent search results, newer than `since_id`
    async fn search_recent(&self, query: &str, since_id: Option<String>) -> Result<Vec<Tweet>>;

    /// Post a reply, returning the new tweet id
    async fn reply(&self, in_reply_to: &str, text: &str) -> Result<String>;

    /// The authenticated user
    async fn me(&self) -> Result<TwitterUser>;
}

/// Per-tweet processing routine
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TweetHandler: Send + Sync {
    async fn process_tweet(&self, tweet: &Tweet) -> Result<TweetAction>;
}
