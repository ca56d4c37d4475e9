//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`].  Client mistakes are answered with a
//! plain-text 400, rate limiting with a JSON 429 plus `Retry-After`, and
//! everything else with a generic JSON 500.
//!
//! Internal errors are logged with full detail; clients only ever see
//! `Internal Server Error`.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::upstream::UpstreamError;

/// Body of the 400 returned for an empty question.
pub const EMPTY_QUESTION_MESSAGE: &str = "質問が空です";

/// All errors that can occur in the tutor-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The question was missing or blank after trimming.
    #[error("question is empty")]
    EmptyQuestion,

    #[error("question too large ({len} bytes); maximum is {max} bytes")]
    QuestionTooLarge { len: usize, max: usize },

    /// The caller sent an invalid request to a non-relay endpoint.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The client exhausted its request budget for the current window.
    #[error("rate limited; retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// The request body was not the expected JSON shape.
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// The model backend failed before streaming started.
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        match self {
            ServerError::EmptyQuestion => {
                (StatusCode::BAD_REQUEST, EMPTY_QUESTION_MESSAGE).into_response()
            }
            ServerError::QuestionTooLarge { .. } | ServerError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
            ServerError::RateLimited { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after_secs.to_string())],
                Json(json!({ "error": "Too many requests" })),
            )
                .into_response(),
            ServerError::InvalidPayload(e) => {
                error!(error = %e, "request payload rejected");
                internal_error()
            }
            ServerError::Upstream(e) => {
                error!(error = %e, "model backend failed before streaming");
                internal_error()
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                internal_error()
            }
        }
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(e: anyhow::Error) -> Self {
        error!(error = ?e, "converting anyhow error to ServerError::Internal");
        ServerError::Internal(e.to_string())
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal Server Error" })),
    )
        .into_response()
}
