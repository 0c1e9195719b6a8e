//! Twitter API v2 client

use super::{SharedToken, Tweet, TwitterApi, TwitterUser};
use crate::config::TwitterConfig;
use crate::error::{BotError, Provider, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const TWEET_FIELDS: &str = "author_id,created_at";
const MAX_RESULTS: &str = "20";

#[derive(Clone)]
pub struct TwitterClient {
    http: Client,
    api_url: String,
    bearer_token: Option<String>,
    user_token: SharedToken,
}

#[derive(Debug, Deserialize)]
struct TweetsResponse {
    #[serde(default)]
    data: Vec<ApiTweet>,
    includes: Option<Includes>,
}

#[derive(Debug, Deserialize)]
struct ApiTweet {
    id: String,
    text: String,
    author_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<TwitterUser>,
}

#[derive(Debug, Deserialize)]
struct DataResponse<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct CreatedTweet {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiProblem {
    title: Option<String>,
    detail: Option<String>,
    #[serde(default)]
    errors: Vec<ApiErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorItem {
    message: String,
}

impl TwitterClient {
    pub fn new(config: &TwitterConfig, user_token: SharedToken, request_timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            bearer_token: config.bearer_token.clone(),
            user_token,
        })
    }

    /// App-only auth for reads, falling back to the user token
    fn read_auth(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        let token = self
            .bearer_token
            .clone()
            .or_else(|| self.user_token.read().clone())
            .ok_or(BotError::NotConfigured("Twitter bearer token"))?;
        Ok(req.bearer_auth(token))
    }

    fn user_auth(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        let token = self
            .user_token
            .read()
            .clone()
            .ok_or(BotError::NotConfigured("Twitter user access token"))?;
        Ok(req.bearer_auth(token))
    }

    async fn check(resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiProblem>(&body) {
            Ok(problem) => problem
                .detail
                .or(problem.title)
                .or_else(|| problem.errors.into_iter().next().map(|e| e.message))
                .unwrap_or_else(|| status.to_string()),
            Err(_) => format!("{}: {}", status, body),
        };
        Err(BotError::upstream(Provider::Twitter, message))
    }

    async fn fetch_tweets(&self, url: &str, query: &[(&str, &str)]) -> Result<Vec<Tweet>> {
        let req = self.read_auth(self.http.get(url).query(query))?;
        let resp: TweetsResponse = Self::check(req.send().await?).await?.json().await?;

        let usernames: HashMap<String, String> = resp
            .includes
            .map(|i| i.users.into_iter().map(|u| (u.id, u.username)).collect())
            .unwrap_or_default();

        Ok(resp
            .data
            .into_iter()
            .map(|t| {
                let author_id = t.author_id.unwrap_or_default();
                Tweet {
                    author_username: usernames.get(&author_id).cloned(),
                    id: t.id,
                    text: t.text,
                    author_id,
                }
            })
            .collect())
    }
}

#[async_trait]
impl TwitterApi for TwitterClient {
    async fn mentions(&self, user_id: &str, since_id: Option<String>) -> Result<Vec<Tweet>> {
        let url = format!("{}/2/users/{}/mentions", self.api_url, user_id);
        let mut query = vec![
            ("max_results", MAX_RESULTS),
            ("tweet.fields", TWEET_FIELDS),
            ("expansions", "author_id"),
            ("user.fields", "username"),
        ];
        if let Some(since) = since_id.as_deref() {
            query.push(("since_id", since));
        }
        self.fetch_tweets(&url, &query).await
    }

    async fn search_recent(&self, search: &str, since_id: Option<String>) -> Result<Vec<Tweet>> {
        let url = format!("{}/2/tweets/search/recent", self.api_url);
        let mut query = vec![
            ("query", search),
            ("max_results", MAX_RESULTS),
            ("tweet.fields", TWEET_FIELDS),
            ("expansions", "author_id"),
            ("user.fields", "username"),
        ];
        if let Some(since) = since_id.as_deref() {
            query.push(("since_id", since));
        }
        self.fetch_tweets(&url, &query).await
    }

    async fn reply(&self, in_reply_to: &str, text: &str) -> Result<String> {
        let url = format!("{}/2/tweets", self.api_url);
        let body = serde_json::json!({
            "text": text,
            "reply": { "in_reply_to_tweet_id": in_reply_to },
        });

        let req = self.user_auth(self.http.post(&url).json(&body))?;
        let created: DataResponse<CreatedTweet> =
            Self::check(req.send().await?).await?.json().await?;
        Ok(created.data.id)
    }

    async fn me(&self) -> Result<TwitterUser> {
        let url = format!("{}/2/users/me", self.api_url);
        let req = self.user_auth(self.http.get(&url))?;
        let me: DataResponse<TwitterUser> = Self::check(req.send().await?).await?.json().await?;
        Ok(me.data)
    }
}
