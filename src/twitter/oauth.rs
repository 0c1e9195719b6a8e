//! OAuth 2.0 authorization code flow with PKCE
//!
//! `begin` registers a pending session keyed by `state`; `complete`
//! consumes it, exchanges the code and installs the user token.

use super::SharedToken;
use crate::config::TwitterConfig;
use crate::error::{BotError, Provider, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use rand::{distr::Alphanumeric, Rng};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;

const AUTHORIZE_URL: &str = "https://twitter.com/i/oauth2/authorize";
const SCOPES: &str = "tweet.read tweet.write users.read offline.access";
const VERIFIER_LEN: usize = 64;
const SESSION_TTL_MINS: i64 = 10;

struct PendingSession {
    verifier: String,
    created_at: DateTime<Utc>,
}

/// Where to send the user, plus the state we expect back
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenGrant {
    pub token_type: String,
    pub access_token: String,
    pub scope: Option<String>,
    pub expires_in: Option<u64>,
    pub refresh_token: Option<String>,
}

pub struct OAuthFlow {
    http: Client,
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: String,
    token_url: String,
    sessions: Mutex<HashMap<String, PendingSession>>,
    user_token: SharedToken,
}

/// Random PKCE code verifier
pub fn generate_verifier() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(VERIFIER_LEN)
        .map(char::from)
        .collect()
}

/// S256 code challenge: base64url(SHA-256(verifier)), unpadded
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// First characters of the client id, for display
pub fn partial_client_id(client_id: &str) -> String {
    let prefix: String = client_id.chars().take(8).collect();
    format!("{}...", prefix)
}

impl OAuthFlow {
    pub fn new(
        config: &TwitterConfig,
        app_url: &str,
        user_token: SharedToken,
        request_timeout_secs: u64,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(request_timeout_secs))
            .build()?;

        let redirect_uri = config.redirect_uri.clone().unwrap_or_else(|| {
            format!("{}/api/twitter/oauth-callback", app_url.trim_end_matches('/'))
        });

        Ok(Self {
            http,
            client_id: config.client_id.clone().filter(|s| !s.is_empty()),
            client_secret: config.client_secret.clone().filter(|s| !s.is_empty()),
            redirect_uri,
            token_url: format!("{}/2/oauth2/token", config.api_url.trim_end_matches('/')),
            sessions: Mutex::new(HashMap::new()),
            user_token,
        })
    }

    pub fn client_id(&self) -> Result<&str> {
        self.client_id
            .as_deref()
            .ok_or(BotError::NotConfigured("TWITTER_CLIENT_ID"))
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn pending_sessions(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Start an authorization: build the URL and remember the verifier
    pub fn begin(&self) -> Result<AuthorizationRequest> {
        let client_id = self.client_id()?;
        let verifier = generate_verifier();
        let state = uuid::Uuid::new_v4().simple().to_string();

        let mut url = Url::parse(AUTHORIZE_URL)
            .map_err(|e| BotError::Internal(format!("Bad authorize URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", SCOPES)
            .append_pair("state", &state)
            .append_pair("code_challenge", &code_challenge(&verifier))
            .append_pair("code_challenge_method", "S256");

        let mut sessions = self.sessions.lock();
        let cutoff = Utc::now() - ChronoDuration::minutes(SESSION_TTL_MINS);
        sessions.retain(|_, s| s.created_at > cutoff);
        sessions.insert(
            state.clone(),
            PendingSession {
                verifier,
                created_at: Utc::now(),
            },
        );

        Ok(AuthorizationRequest {
            url: url.to_string(),
            state,
        })
    }

    /// Take the verifier for `state`; each state is usable once
    fn take_verifier(&self, state: &str) -> Result<String> {
        let session = self
            .sessions
            .lock()
            .remove(state)
            .ok_or_else(|| BotError::Validation("Unknown or already used OAuth state".into()))?;

        if session.created_at < Utc::now() - ChronoDuration::minutes(SESSION_TTL_MINS) {
            return Err(BotError::Validation("OAuth state expired".into()));
        }
        Ok(session.verifier)
    }

    /// Exchange the authorization code and install the user token
    pub async fn complete(&self, code: &str, state: &str) -> Result<TokenGrant> {
        let verifier = self.take_verifier(state)?;
        let client_id = self.client_id()?.to_string();

        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code_verifier", verifier.as_str()),
            ("client_id", client_id.as_str()),
        ];

        let mut req = self.http.post(&self.token_url).form(&form);
        if let Some(secret) = &self.client_secret {
            req = req.basic_auth(&client_id, Some(secret));
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BotError::upstream(
                Provider::Twitter,
                format!("Token exchange failed ({}): {}", status, body),
            ));
        }

        let grant: TokenGrant = resp.json().await?;
        *self.user_token.write() = Some(grant.access_token.clone());
        tracing::info!(
            "Twitter user token installed (scope: {})",
            grant.scope.as_deref().unwrap_or("?")
        );
        Ok(grant)
    }
}
