//! HTTP error mapping
//!
//! | kind         | status | body                                  |
//! |--------------|--------|---------------------------------------|
//! | Validation   | 400    | `{error: <message>}`                  |
//! | Unauthorized | 401    | `{error: <message>}`                  |
//! | Upstream     | 500    | `{error: <context>, details: <message>}` |
//! | Unexpected   | 500    | `{error: <context>}`                  |

use crate::error::{BotError, ErrorKind};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// A `BotError` plus the endpoint-level description of what failed
#[derive(Debug)]
pub struct ApiError {
    pub context: &'static str,
    pub source: BotError,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ApiError {
    pub fn new(context: &'static str, source: BotError) -> Self {
        Self { context, source }
    }

    /// For `map_err`: `.map_err(ApiError::context("Failed to send notification"))`
    pub fn context(context: &'static str) -> impl FnOnce(BotError) -> ApiError {
        move |source| ApiError::new(context, source)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("Invalid request", BotError::Validation(message.into()))
    }

    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Upstream | ErrorKind::Unexpected => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<BotError> for ApiError {
    fn from(source: BotError) -> Self {
        ApiError::new("Internal server error", source)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.kind() {
            ErrorKind::Validation | ErrorKind::Unauthorized => {
                tracing::debug!("{}: {}", self.context, self.source);
                ErrorBody {
                    error: self.source.to_string(),
                    details: None,
                }
            }
            ErrorKind::Upstream => {
                tracing::error!("{}: {}", self.context, self.source);
                ErrorBody {
                    error: self.context.to_string(),
                    details: Some(self.source.to_string()),
                }
            }
            ErrorKind::Unexpected => {
                tracing::error!("{}: {:?}", self.context, self.source);
                ErrorBody {
                    error: self.context.to_string(),
                    details: None,
                }
            }
        };

        (self.status(), Json(body)).into_response()
    }
}
