//! Twitter endpoints: OAuth 2.0 setup, CRC challenge and webhook events

use super::{ApiError, AppState};
use crate::error::BotError;
use crate::twitter::oauth::partial_client_id;
use crate::twitter::webhook::{crc_response_token, handle_tweet_events, WebhookPayload};
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookQuery {
    pub crc_token: Option<String>,
    pub action: Option<String>,
}

/// `GET /api/twitter/oauth-test`: start an authorization and show the URL
pub async fn oauth_test(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let context = "Twitter OAuth configuration error";
    let twitter = state.twitter().map_err(ApiError::context(context))?;
    let client_id = twitter.oauth.client_id().map_err(ApiError::context(context))?;
    let request = twitter.oauth.begin().map_err(ApiError::context(context))?;

    Ok(Json(json!({
        "status": "ok",
        "message": "Twitter OAuth 2.0 is configured. Open authUrl to authorize the bot.",
        "clientId": partial_client_id(client_id),
        "redirectUri": twitter.oauth.redirect_uri(),
        "authUrl": request.url,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

/// `GET /api/twitter/oauth-callback?code=&state=`
pub async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OAuthCallbackQuery>,
) -> Result<Json<Value>, ApiError> {
    if let Some(error) = query.error {
        let description = query.error_description.unwrap_or_default();
        return Err(ApiError::validation(format!(
            "Authorization denied: {} {}",
            error, description
        )
        .trim_end()
        .to_string()));
    }

    let (Some(code), Some(oauth_state)) = (query.code, query.state) else {
        return Err(ApiError::validation("Missing code or state"));
    };

    let context = "Failed to complete Twitter authorization";
    let twitter = state.twitter().map_err(ApiError::context(context))?;
    let grant = twitter
        .oauth
        .complete(&code, &oauth_state)
        .await
        .map_err(ApiError::context(context))?;

    Ok(Json(json!({
        "success": true,
        "message": "Twitter account authorized",
        "scope": grant.scope,
        "expiresIn": grant.expires_in,
    })))
}

/// `GET /api/twitter/webhook`
///
/// With `crc_token`, answers the CRC challenge. Otherwise `action` selects
/// a manual run: `process-mentions` or `process-hashtags`.
pub async fn webhook_get(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WebhookQuery>,
) -> Result<Json<Value>, ApiError> {
    if let Some(crc_token) = query.crc_token.as_deref() {
        let context = "Failed to answer CRC challenge";
        let twitter = state.twitter().map_err(ApiError::context(context))?;
        let secret = twitter
            .consumer_secret
            .as_deref()
            .ok_or(BotError::NotConfigured("TWITTER_CONSUMER_SECRET"))
            .map_err(ApiError::context(context))?;
        let response_token =
            crc_response_token(secret, crc_token).map_err(ApiError::context(context))?;
        return Ok(Json(json!({ "response_token": response_token })));
    }

    let context = "Failed to process tweets";
    let (message, summary) = match query.action.as_deref() {
        Some("process-mentions") => {
            let twitter = state.twitter().map_err(ApiError::context(context))?;
            let summary = twitter
                .bot
                .process_mentions()
                .await
                .map_err(ApiError::context(context))?;
            ("Processed mentions", summary)
        }
        Some("process-hashtags") => {
            let twitter = state.twitter().map_err(ApiError::context(context))?;
            let summary = twitter
                .bot
                .process_hashtags()
                .await
                .map_err(ApiError::context(context))?;
            ("Processed hashtag tweets", summary)
        }
        Some(other) => {
            return Err(ApiError::validation(format!("Invalid action: {}", other)));
        }
        None => return Err(ApiError::validation("Missing crc_token or action")),
    };

    tracing::info!(
        "{}: {} fetched, {} replied, {} failed",
        message,
        summary.fetched,
        summary.replied,
        summary.failed
    );
    Ok(Json(json!({
        "success": true,
        "message": message,
        "summary": summary,
    })))
}

/// `POST /api/twitter/webhook`: Account Activity events
pub async fn webhook_post(
    State(state): State<Arc<AppState>>,
    body: Result<Json<WebhookPayload>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(payload) =
        body.map_err(|e| ApiError::validation(format!("Invalid webhook body: {}", e.body_text())))?;

    let context = "Failed to process Twitter webhook";
    let twitter = state.twitter().map_err(ApiError::context(context))?;
    let actions = handle_tweet_events(twitter.bot.as_ref(), payload.tweet_create_events)
        .await
        .map_err(ApiError::context(context))?;

    tracing::debug!("Handled {} tweet events", actions.len());
    Ok(Json(json!({ "ok": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aptos::MockTransactionSubmitter;
    use crate::api::test_support::{parts, state};
    use crate::api::TwitterState;
    use crate::config::TwitterConfig;
    use crate::error::Provider;
    use crate::twitter::{MockTwitterApi, OAuthFlow, SharedToken, Tweet, TwitterBot};
    use axum::http::StatusCode;
    use parking_lot::RwLock;

    fn config() -> TwitterConfig {
        toml::from_str(
            r#"
            client_id = "abcdefghijklmnop"
            bot_user_id = "100"
            bot_username = "marketbot"
            hashtags = ["PredictionMarket"]
            "#,
        )
        .unwrap()
    }

    fn with_twitter(api: MockTwitterApi, consumer_secret: Option<&str>) -> Arc<AppState> {
        let config = config();
        let token: SharedToken = Arc::new(RwLock::new(None));
        let mut app = state(MockTransactionSubmitter::new());
        app.twitter = Some(TwitterState {
            bot: Arc::new(TwitterBot::new(
                Arc::new(api),
                &config,
                "https://market.example".into(),
            )),
            oauth: OAuthFlow::new(&config, "https://market.example", token, 5).unwrap(),
            consumer_secret: consumer_secret.map(String::from),
        });
        Arc::new(app)
    }

    fn query(crc_token: Option<&str>, action: Option<&str>) -> Query<WebhookQuery> {
        Query(WebhookQuery {
            crc_token: crc_token.map(String::from),
            action: action.map(String::from),
        })
    }

    #[tokio::test]
    async fn test_crc_challenge() {
        let app = with_twitter(MockTwitterApi::new(), Some("key"));
        let (status, body) = parts(
            webhook_get(
                State(app),
                query(Some("The quick brown fox jumps over the lazy dog"), None),
            )
            .await,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["response_token"],
            "sha256=97yD9DBThCSxMpjmqm+xQ+9NWaFJRhdZl0edvC0aPNg="
        );
    }

    #[tokio::test]
    async fn test_crc_without_secret_fails() {
        let app = with_twitter(MockTwitterApi::new(), None);
        let (status, _) = parts(webhook_get(State(app), query(Some("abc"), None)).await).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_invalid_action() {
        let app = with_twitter(MockTwitterApi::new(), None);
        let (status, body) = parts(webhook_get(State(app.clone()), query(None, Some("dance"))).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid action: dance");

        let (status, _) = parts(webhook_get(State(app), query(None, None)).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_process_mentions_summary() {
        let mut api = MockTwitterApi::new();
        api.expect_mentions()
            .withf(|user_id, since| user_id == "100" && since.is_none())
            .times(1)
            .returning(|_, _| {
                Ok(vec![Tweet {
                    id: "11".into(),
                    text: "@marketbot help".into(),
                    author_id: "7".into(),
                    author_username: Some("alice".into()),
                }])
            });
        api.expect_reply()
            .withf(|id, _| id == "11")
            .times(1)
            .returning(|_, _| Ok("12".into()));

        let app = with_twitter(api, None);
        let (status, body) =
            parts(webhook_get(State(app), query(None, Some("process-mentions"))).await).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["summary"]["fetched"], 1);
        assert_eq!(body["summary"]["replied"], 1);
    }

    #[tokio::test]
    async fn test_process_hashtags_upstream_failure() {
        let mut api = MockTwitterApi::new();
        api.expect_search_recent()
            .returning(|_, _| Err(BotError::upstream(Provider::Twitter, "Too Many Requests")));

        let app = with_twitter(api, None);
        let (status, body) =
            parts(webhook_get(State(app), query(None, Some("process-hashtags"))).await).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to process tweets");
        assert!(body["details"].as_str().unwrap().contains("Too Many Requests"));
    }

    #[tokio::test]
    async fn test_webhook_events_replied() {
        let mut api = MockTwitterApi::new();
        api.expect_reply()
            .withf(|id, text| id == "55" && text.contains("YES 10 on market 3"))
            .times(1)
            .returning(|_, _| Ok("56".into()));

        let payload: WebhookPayload = serde_json::from_value(json!({
            "for_user_id": "100",
            "tweet_create_events": [{
                "id_str": "55",
                "text": "@marketbot bet 3 yes 10",
                "user": { "id_str": "7", "screen_name": "alice" }
            }]
        }))
        .unwrap();

        let (status, body) =
            parts(webhook_post(State(with_twitter(api, None)), Ok(Json(payload))).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn test_webhook_unconfigured() {
        let app = Arc::new(state(MockTransactionSubmitter::new()));
        let (status, body) =
            parts(webhook_post(State(app), Ok(Json(WebhookPayload::default()))).await).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to process Twitter webhook");
    }

    #[tokio::test]
    async fn test_oauth_test_reports_partial_client_id() {
        let app = with_twitter(MockTwitterApi::new(), None);
        let (status, body) = parts(oauth_test(State(app.clone())).await).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["clientId"], "abcdefgh...");
        assert!(body["authUrl"].as_str().unwrap().contains("code_challenge="));
        assert_eq!(app.twitter().unwrap().oauth.pending_sessions(), 1);
    }

    #[tokio::test]
    async fn test_oauth_callback_rejects_unknown_state() {
        let app = with_twitter(MockTwitterApi::new(), None);
        let callback = Query(OAuthCallbackQuery {
            code: Some("abc".into()),
            state: Some("never-issued".into()),
            error: None,
            error_description: None,
        });

        let (status, body) = parts(oauth_callback(State(app), callback).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Unknown or already used OAuth state");
    }

    #[tokio::test]
    async fn test_oauth_callback_denied() {
        let app = with_twitter(MockTwitterApi::new(), None);
        let callback = Query(OAuthCallbackQuery {
            code: None,
            state: None,
            error: Some("access_denied".into()),
            error_description: None,
        });

        let (status, body) = parts(oauth_callback(State(app), callback).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Authorization denied: access_denied");
    }
}
