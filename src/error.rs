//! Error types for the bridge

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, BotError>;

/// External services the bridge talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Aptos,
    Telegram,
    Twitter,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Aptos => write!(f, "Aptos"),
            Provider::Telegram => write!(f, "Telegram"),
            Provider::Twitter => write!(f, "Twitter"),
        }
    }
}

/// Error classification used by the HTTP layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing input
    Validation,
    /// Caller failed a shared-secret check
    Unauthorized,
    /// A provider (chain node, bot API) returned an error or was unreachable
    Upstream,
    /// Anything else
    Unexpected,
}

#[derive(Error, Debug)]
pub enum BotError {
    #[error("{0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("{provider} API error: {message}")]
    Upstream { provider: Provider, message: String },

    #[error("Transaction {hash} failed: {vm_status}")]
    TransactionFailed { hash: String, vm_status: String },

    #[error("Timed out after {secs}s waiting for {what}")]
    Timeout { what: String, secs: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BotError {
    /// Shorthand for a provider error
    pub fn upstream(provider: Provider, message: impl Into<String>) -> Self {
        BotError::Upstream {
            provider,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BotError::Validation(_) => ErrorKind::Validation,
            BotError::Unauthorized(_) => ErrorKind::Unauthorized,
            BotError::Upstream { .. }
            | BotError::TransactionFailed { .. }
            | BotError::Timeout { .. }
            | BotError::Http(_) => ErrorKind::Upstream,
            BotError::Json(_)
            | BotError::Database(_)
            | BotError::Config(_)
            | BotError::NotConfigured(_)
            | BotError::Internal(_) => ErrorKind::Unexpected,
        }
    }
}

impl From<config::ConfigError> for BotError {
    fn from(e: config::ConfigError) -> Self {
        BotError::Config(e.to_string())
    }
}
