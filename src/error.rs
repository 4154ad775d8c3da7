use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::result::ApiResult;
use crate::utils::{error_codes, notices};

/// Startup configuration problems. Any of these stops the process before it serves.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required variable {0}")]
    Missing(&'static str),

    #[error("invalid value '{value}' for {var}")]
    Invalid { var: &'static str, value: String },

    #[error("rejected configuration: {0}")]
    Rejected(String),
}

/// Failure of a live call against a window store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("unexpected store reply: {0}")]
    Reply(String),

    #[error("store did not answer within {0:?}")]
    Timeout(std::time::Duration),
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("chat backend request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("chat backend returned status {0}")]
    UpstreamStatus(u16),

    #[error("chat backend did not answer within {0:?}")]
    UpstreamTimeout(std::time::Duration),

    #[error("messaging platform rejected the call: {0}")]
    Messenger(String),

    #[error("malformed event: {0}")]
    BadEvent(String),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            RelayError::BadEvent(reason) => (
                StatusCode::BAD_REQUEST,
                error_codes::VALIDATION_ERROR,
                reason.clone(),
            ),
            _ => {
                tracing::error!("request failed: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_codes::INTERNAL_ERROR,
                    notices::GENERIC_FAILURE.to_string(),
                )
            }
        };

        (status, Json(ApiResult::<()>::error(code, &message))).into_response()
    }
}
