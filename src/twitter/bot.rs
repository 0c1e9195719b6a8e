//! Twitter bot: turns mentions and hashtag tweets into replies
//!
//! Recognised tweet commands (mentions and hashtags are stripped first):
//! - `bet <market_id> <yes|no> <amount>` -> reply with a signing link
//! - `help` -> reply with usage
//!
//! A mention without a command gets the usage reply; a hashtag tweet
//! without a command is ignored.

use super::{Tweet, TweetHandler, TwitterApi};
use crate::bet::BetSide;
use crate::config::TwitterConfig;
use crate::error::Result;
use crate::wallet::app_link;
use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// What the bot did with a tweet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TweetAction {
    Ignored,
    RepliedBet,
    RepliedHelp,
}

/// Parsed intent of a tweet
#[derive(Debug, Clone, PartialEq)]
pub enum TweetIntent {
    Bet {
        market_id: String,
        side: BetSide,
        amount: Decimal,
    },
    Help,
    /// Addressed to the bot with nothing we understand
    Mention,
    None,
}

/// Counts from a manual processing run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessSummary {
    pub fetched: usize,
    pub replied: usize,
    pub failed: usize,
}

pub struct TwitterBot {
    api: Arc<dyn TwitterApi>,
    app_url: String,
    bot_username: String,
    hashtags: Vec<String>,
    bot_user_id: OnceCell<String>,
    last_mention_id: Mutex<Option<String>>,
    last_hashtag_id: Mutex<Option<String>>,
}

impl TwitterBot {
    pub fn new(api: Arc<dyn TwitterApi>, config: &TwitterConfig, app_url: String) -> Self {
        let bot_user_id = match &config.bot_user_id {
            Some(id) => OnceCell::new_with(Some(id.clone())),
            None => OnceCell::new(),
        };

        Self {
            api,
            app_url,
            bot_username: config.bot_username.trim_start_matches('@').to_lowercase(),
            hashtags: config
                .hashtags
                .iter()
                .map(|h| h.trim_start_matches('#').to_lowercase())
                .collect(),
            bot_user_id,
            last_mention_id: Mutex::new(None),
            last_hashtag_id: Mutex::new(None),
        }
    }

    /// The bot's own user id, fetched once from `/2/users/me` when not configured
    async fn bot_user_id(&self) -> Result<&str> {
        let id = self
            .bot_user_id
            .get_or_try_init(|| async {
                let me = self.api.me().await?;
                tracing::info!("Resolved Twitter bot user @{} ({})", me.username, me.id);
                Ok::<_, crate::error::BotError>(me.id)
            })
            .await?;
        Ok(id.as_str())
    }

    /// Classify a tweet's text
    pub fn parse_intent(&self, text: &str) -> TweetIntent {
        let mut mentioned = false;
        let mut words = Vec::new();

        for token in text.split_whitespace() {
            if let Some(handle) = token.strip_prefix('@') {
                let handle = handle.trim_end_matches(|c: char| !c.is_alphanumeric() && c != '_');
                if !self.bot_username.is_empty() && handle.eq_ignore_ascii_case(&self.bot_username) {
                    mentioned = true;
                }
            } else if !token.starts_with('#') {
                words.push(token.to_lowercase());
            }
        }

        if let Some(pos) = words.iter().position(|w| w == "bet") {
            if let [market, side, amount, ..] = &words[pos + 1..] {
                let side = BetSide::parse(side);
                let amount = amount.trim_start_matches('$').parse::<Decimal>().ok();
                if let (Some(side), Some(amount)) = (side, amount) {
                    if amount > Decimal::ZERO {
                        return TweetIntent::Bet {
                            market_id: market.clone(),
                            side,
                            amount,
                        };
                    }
                }
            }
            return TweetIntent::Help;
        }

        if words.iter().any(|w| w == "help") {
            return TweetIntent::Help;
        }

        if mentioned {
            TweetIntent::Mention
        } else {
            TweetIntent::None
        }
    }

    fn is_own_tweet(&self, tweet: &Tweet) -> bool {
        let by_id = self
            .bot_user_id
            .get()
            .is_some_and(|id| *id == tweet.author_id);
        let by_name = !self.bot_username.is_empty()
            && tweet
                .author_username
                .as_deref()
                .is_some_and(|u| u.eq_ignore_ascii_case(&self.bot_username));
        by_id || by_name
    }

    fn help_reply(&self) -> String {
        format!(
            "Bet on a market with: bet <market_id> <yes|no> <amount>\nMarkets: {}",
            self.app_url.trim_end_matches('/')
        )
    }

    /// Fetch mentions since the last run and process them oldest first
    pub async fn process_mentions(&self) -> Result<ProcessSummary> {
        let user_id = self.bot_user_id().await?.to_string();
        let since = self.last_mention_id.lock().clone();
        let tweets = self.api.mentions(&user_id, since).await?;
        Ok(self.process_batch(tweets, &self.last_mention_id).await)
    }

    /// Search recent tweets carrying the configured hashtags
    pub async fn process_hashtags(&self) -> Result<ProcessSummary> {
        if self.hashtags.is_empty() {
            return Ok(ProcessSummary::default());
        }
        let query = format!(
            "({}) -is:retweet",
            self.hashtags
                .iter()
                .map(|h| format!("#{}", h))
                .collect::<Vec<_>>()
                .join(" OR ")
        );
        let since = self.last_hashtag_id.lock().clone();
        let tweets = self.api.search_recent(&query, since).await?;
        Ok(self.process_batch(tweets, &self.last_hashtag_id).await)
    }

    async fn process_batch(&self, mut tweets: Vec<Tweet>, cursor: &Mutex<Option<String>>) -> ProcessSummary {
        tweets.sort_by_key(|t| t.id.parse::<u128>().unwrap_or(0));

        let mut summary = ProcessSummary {
            fetched: tweets.len(),
            ..Default::default()
        };

        for tweet in &tweets {
            match self.process_tweet(tweet).await {
                Ok(TweetAction::Ignored) => {}
                Ok(_) => summary.replied += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!("Failed to process tweet {}: {}", tweet.id, e);
                }
            }
        }

        if let Some(newest) = tweets.last() {
            *cursor.lock() = Some(newest.id.clone());
        }
        summary
    }
}

#[async_trait]
impl TweetHandler for TwitterBot {
    async fn process_tweet(&self, tweet: &Tweet) -> Result<TweetAction> {
        if self.is_own_tweet(tweet) {
            return Ok(TweetAction::Ignored);
        }

        let (reply, action) = match self.parse_intent(&tweet.text) {
            TweetIntent::Bet {
                market_id,
                side,
                amount,
            } => {
                let amount = amount.to_string();
                let link = app_link(
                    &self.app_url,
                    "bet",
                    &[
                        ("market", market_id.as_str()),
                        ("side", side.as_str()),
                        ("amount", amount.as_str()),
                        ("twitter", tweet.author_id.as_str()),
                    ],
                );
                (
                    format!(
                        "{} {} on market {}. Sign it with your wallet: {}",
                        side.as_str().to_uppercase(),
                        amount,
                        market_id,
                        link
                    ),
                    TweetAction::RepliedBet,
                )
            }
            TweetIntent::Help | TweetIntent::Mention => (self.help_reply(), TweetAction::RepliedHelp),
            TweetIntent::None => return Ok(TweetAction::Ignored),
        };

        let reply_id = self.api.reply(&tweet.id, &reply).await?;
        tracing::info!("Replied to tweet {} with {} ({:?})", tweet.id, reply_id, action);
        Ok(action)
    }
}
