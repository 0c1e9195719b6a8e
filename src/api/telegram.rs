//! Telegram endpoints and the wallet connection callback

use super::{ApiError, AppState};
use crate::bet::Scalar;
use crate::error::BotError;
use crate::telegram::{escape_html, Update};
use crate::wallet::truncate_address;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyRequest {
    pub user_id: Option<Scalar>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TestCommandRequest {
    pub command: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WalletCallbackQuery {
    pub user: Option<String>,
    pub address: Option<String>,
    pub action: Option<String>,
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// `POST /api/telegram/notify`: the message is relayed as plain text
pub async fn notify(
    State(state): State<Arc<AppState>>,
    body: Result<Json<NotifyRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) =
        body.map_err(|e| ApiError::validation(format!("Invalid JSON body: {}", e.body_text())))?;

    let user_id = request.user_id.as_ref().and_then(Scalar::as_text);
    let message = non_blank(request.message.as_deref());
    let (Some(user_id), Some(message)) = (user_id, message) else {
        return Err(ApiError::validation("Missing userId or message"));
    };

    let context = "Failed to send notification";
    let telegram = state.telegram().map_err(ApiError::context(context))?;
    telegram
        .bot
        .api()
        .send_text(&user_id, message)
        .await
        .map_err(ApiError::context(context))?;

    tracing::info!("Notification sent to {}", user_id);
    Ok(Json(json!({ "success": true })))
}

/// `GET /api/telegram/status`
pub async fn status(State(state): State<Arc<AppState>>) -> Response {
    let result = match state.telegram() {
        Ok(telegram) => telegram.bot.api().get_me().await,
        Err(e) => Err(e),
    };

    match result {
        Ok(bot) => Json(json!({
            "status": "online",
            "bot": bot,
            "timestamp": Utc::now().to_rfc3339(),
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("Telegram status check failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "error",
                    "message": e.to_string(),
                    "timestamp": Utc::now().to_rfc3339(),
                })),
            )
                .into_response()
        }
    }
}

/// `POST /api/telegram/status`: echoes a simulated command result
pub async fn test_command(
    body: Result<Json<TestCommandRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) =
        body.map_err(|e| ApiError::validation(format!("Invalid JSON body: {}", e.body_text())))?;
    let command = non_blank(request.command.as_deref())
        .ok_or_else(|| ApiError::validation("Missing command"))?;

    tracing::info!("Test command received: {}", command);
    Ok(Json(json!({
        "command": command,
        "status": "processed",
        "message": format!("Command {} processed successfully", command),
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

/// `POST /api/telegram/webhook`
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<Update>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let context = "Failed to process Telegram update";
    let telegram = state.telegram().map_err(ApiError::context(context))?;

    if let Some(expected) = telegram.webhook_secret.as_deref() {
        let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if provided != Some(expected) {
            tracing::warn!("Rejected Telegram webhook call with bad secret token");
            return Err(ApiError::new(
                context,
                BotError::Unauthorized("invalid webhook secret token".into()),
            ));
        }
    }

    let Json(update) =
        body.map_err(|e| ApiError::validation(format!("Invalid update: {}", e.body_text())))?;

    telegram
        .bot
        .handle_update(&update)
        .await
        .map_err(ApiError::context(context))?;

    Ok(Json(json!({ "ok": true })))
}

/// `GET /api/telegram/webhook?user=&address=&action=connect|disconnect`
///
/// The address is stored exactly as received.
pub async fn wallet_callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WalletCallbackQuery>,
) -> Result<Json<Value>, ApiError> {
    let user = non_blank(query.user.as_deref());
    let address = non_blank(query.address.as_deref());
    let action = non_blank(query.action.as_deref());

    let context = "Failed to update wallet link";
    let (user, message, notice) = match (action, user, address) {
        (Some("connect"), Some(user), Some(address)) => {
            state
                .wallets
                .link(user, address)
                .await
                .map_err(ApiError::context(context))?;
            tracing::info!("Linked wallet {} to Telegram user {}", address, user);
            (
                user,
                "Wallet connected successfully",
                format!(
                    "✅ Wallet <code>{}</code> connected. You can now place bets with /bet.",
                    escape_html(&truncate_address(address))
                ),
            )
        }
        (Some("disconnect"), Some(user), _) => {
            let removed = state
                .wallets
                .unlink(user)
                .await
                .map_err(ApiError::context(context))?;
            tracing::info!("Unlinked wallet for Telegram user {}", user);
            let notice = match removed {
                Some(address) => format!(
                    "🔌 Wallet <code>{}</code> disconnected.",
                    escape_html(&truncate_address(&address))
                ),
                None => "🔌 No wallet was connected.".to_string(),
            };
            (user, "Wallet disconnected successfully", notice)
        }
        (Some("connect"), _, _) | (Some("disconnect"), _, _) | (None, _, _) => {
            return Err(ApiError::validation("Missing required parameters"));
        }
        (Some(other), _, _) => {
            return Err(ApiError::validation(format!("Invalid action: {}", other)));
        }
    };

    // Confirmation is best effort; the link is already stored
    if let Some(telegram) = state.telegram.as_ref() {
        if let Err(e) = telegram.bot.api().send_message(user, &notice).await {
            tracing::warn!("Failed to confirm wallet change to {}: {}", user, e);
        }
    }

    Ok(Json(json!({ "success": true, "message": message })))
}
