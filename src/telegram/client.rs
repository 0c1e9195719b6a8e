//! Telegram Bot API client

use super::{BotInfo, TelegramApi};
use crate::config::TelegramConfig;
use crate::error::{BotError, Provider, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

/// HTTP client for `https://api.telegram.org/bot<token>/...`
#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    api_url: String,
    bot_token: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    disable_web_page_preview: bool,
}

#[derive(Debug, Serialize)]
struct SetWebhookRequest<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    secret_token: Option<&'a str>,
    allowed_updates: &'a [&'a str],
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig, request_timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.bot_token, method)
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp: ApiResponse<T> = self
            .http
            .post(self.method_url(method))
            .json(body)
            .send()
            .await?
            .json()
            .await?;

        if !resp.ok {
            return Err(BotError::upstream(
                Provider::Telegram,
                resp.description
                    .unwrap_or_else(|| format!("{} failed", method)),
            ));
        }

        resp.result.ok_or_else(|| {
            BotError::upstream(Provider::Telegram, format!("{} returned no result", method))
        })
    }

    /// Point Telegram at our webhook endpoint
    pub async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<()> {
        let request = SetWebhookRequest {
            url,
            secret_token,
            allowed_updates: &["message", "edited_message"],
        };
        let _: bool = self.call("setWebhook", &request).await?;
        tracing::info!("Telegram webhook set to {}", url);
        Ok(())
    }
}

#[async_trait]
impl TelegramApi for TelegramClient {
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: Some("HTML"),
            disable_web_page_preview: true,
        };
        let _: serde_json::Value = self.call("sendMessage", &request).await?;
        Ok(())
    }

    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()> {
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: None,
            disable_web_page_preview: true,
        };
        let _: serde_json::Value = self.call("sendMessage", &request).await?;
        Ok(())
    }

    async fn get_me(&self) -> Result<BotInfo> {
        self.call("getMe", &serde_json::json!({})).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, routing::post, Json, Router};
    use serde_json::{json, Value};

    async fn bot_method(Path((token, method)): Path<(String, String)>, body: Json<Value>) -> Json<Value> {
        if token != "bot123:abc" {
            return Json(json!({ "ok": false, "description": "Unauthorized" }));
        }
        match method.as_str() {
            "getMe" => Json(json!({
                "ok": true,
                "result": { "id": 99, "is_bot": true, "first_name": "Market", "username": "market_bot" }
            })),
            "sendMessage" if body["chat_id"] == "404" => Json(json!({
                "ok": false,
                "description": "Bad Request: chat not found"
            })),
            // Telegram rejects a bare `<` in HTML mode
            "sendMessage" if body["parse_mode"] == "HTML" && body["text"].as_str().is_some_and(|t| t.contains(" < ")) => {
                Json(json!({ "ok": false, "description": "Bad Request: can't parse entities" }))
            }
            "sendMessage" => Json(json!({ "ok": true, "result": { "message_id": 1 } })),
            "setWebhook" => Json(json!({ "ok": true, "result": true })),
            _ => Json(json!({ "ok": false, "description": "Not Found" })),
        }
    }

    async fn spawn_api() -> String {
        let app = Router::new().route("/{token}/{method}", post(bot_method));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(api_url: String, token: &str) -> TelegramClient {
        let config = TelegramConfig {
            bot_token: token.to_string(),
            webhook_secret: None,
            api_url,
        };
        TelegramClient::new(&config, 5).unwrap()
    }

    #[tokio::test]
    async fn test_get_me() {
        let client = client(spawn_api().await, "123:abc");
        let me = client.get_me().await.unwrap();
        assert_eq!(me.id, 99);
        assert_eq!(me.username.as_deref(), Some("market_bot"));
    }

    #[tokio::test]
    async fn test_send_message_error_carries_description() {
        let client = client(spawn_api().await, "123:abc");
        client.send_message("42", "hi").await.unwrap();

        let err = client.send_message("404", "hi").await.unwrap_err();
        assert!(err.to_string().contains("chat not found"));
    }

    #[tokio::test]
    async fn test_send_text_has_no_parse_mode() {
        let client = client(spawn_api().await, "123:abc");
        let text = "Market 7 resolved: YES if BTC < 100k & ETH > 5k";

        client.send_text("42", text).await.unwrap();

        let err = client.send_message("42", text).await.unwrap_err();
        assert!(err.to_string().contains("can't parse entities"));
    }

    #[test]
    fn test_plain_request_omits_parse_mode() {
        let request = SendMessageRequest {
            chat_id: "42",
            text: "a < b",
            parse_mode: None,
            disable_web_page_preview: true,
        };
        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("parse_mode").is_none());
        assert_eq!(body["text"], "a < b");
    }

    #[tokio::test]
    async fn test_bad_token() {
        let client = client(spawn_api().await, "wrong");
        let err = client.get_me().await.unwrap_err();
        assert!(err.to_string().contains("Unauthorized"));
    }

    #[tokio::test]
    async fn test_set_webhook() {
        let client = client(spawn_api().await, "123:abc");
        client
            .set_webhook("https://bridge.example/api/telegram/webhook", Some("s3cret"))
            .await
            .unwrap();
    }
}
