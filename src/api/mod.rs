//! HTTP API
//!
//! ```text
//! POST /api/bet                    place a bet on-chain
//! POST /api/telegram/notify        send a Telegram message
//! GET  /api/telegram/status        getMe liveness check
//! POST /api/telegram/status        simulated command processing
//! POST /api/telegram/webhook       Telegram updates
//! GET  /api/telegram/webhook       wallet connect/disconnect callback
//! GET  /api/twitter/oauth-test     OAuth 2.0 configuration check
//! GET  /api/twitter/oauth-callback OAuth 2.0 code exchange
//! POST /api/twitter/webhook        tweet_create_events
//! GET  /api/twitter/webhook        CRC challenge / manual triggers
//! ```

pub mod bet;
pub mod error;
pub mod telegram;
pub mod twitter;

use crate::bet::BetService;
use crate::error::{BotError, Result};
use crate::telegram::TelegramBot;
use crate::twitter::{OAuthFlow, TwitterBot};
use crate::wallet::WalletLinkStore;
use axum::{routing::get, routing::post, Router};
use std::sync::Arc;

pub use error::ApiError;

/// Telegram pieces of the app state
pub struct TelegramState {
    pub bot: TelegramBot,
    pub webhook_secret: Option<String>,
}

/// Twitter pieces of the app state
pub struct TwitterState {
    pub bot: Arc<TwitterBot>,
    pub oauth: OAuthFlow,
    pub consumer_secret: Option<String>,
}

/// State shared across handlers
pub struct AppState {
    pub bets: BetService,
    pub wallets: Arc<dyn WalletLinkStore>,
    pub telegram: Option<TelegramState>,
    pub twitter: Option<TwitterState>,
}

impl AppState {
    pub fn telegram(&self) -> Result<&TelegramState> {
        self.telegram
            .as_ref()
            .ok_or(BotError::NotConfigured("Telegram bot"))
    }

    pub fn twitter(&self) -> Result<&TwitterState> {
        self.twitter
            .as_ref()
            .ok_or(BotError::NotConfigured("Twitter bot"))
    }
}

async fn health_check() -> &'static str {
    "OK"
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/bet", post(bet::place_bet))
        .route("/api/telegram/notify", post(telegram::notify))
        .route(
            "/api/telegram/status",
            get(telegram::status).post(telegram::test_command),
        )
        .route(
            "/api/telegram/webhook",
            get(telegram::wallet_callback).post(telegram::webhook),
        )
        .route("/api/twitter/oauth-test", get(twitter::oauth_test))
        .route("/api/twitter/oauth-callback", get(twitter::oauth_callback))
        .route(
            "/api/twitter/webhook",
            get(twitter::webhook_get).post(twitter::webhook_post),
        )
        .with_state(state)
}

/// Start the API server
pub async fn serve(state: Arc<AppState>, addr: &str) -> Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| BotError::Internal(format!("Cannot bind {}: {}", addr, e)))?;
    tracing::info!("API server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| BotError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::aptos::MockTransactionSubmitter;
    use crate::wallet::InMemoryWalletLinks;
    use axum::response::{IntoResponse, Response};
    use serde_json::Value;

    pub const FUNCTION: &str = "0xcafe::prediction_market::buy_tokens";

    pub fn state(submitter: MockTransactionSubmitter) -> AppState {
        AppState {
            bets: BetService::new(Arc::new(submitter), FUNCTION.into()),
            wallets: Arc::new(InMemoryWalletLinks::new()),
            telegram: None,
            twitter: None,
        }
    }

    /// Status and JSON body of a handler result
    pub async fn parts<T: IntoResponse>(result: T) -> (axum::http::StatusCode, Value) {
        let response: Response = result.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }
}
