//! Streaming solve endpoint.
//!
//! Validates the question, makes exactly one upstream call with the configured
//! system instruction and sampling parameters, and relays the answer as SSE.

use std::sync::Arc;

use bytes::Bytes;
use axum::extract::State;
use axum::response::Response;
use axum::routing::post;
use axum::Router;
use tracing::debug;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::relay;
use crate::schemas::solve::{ErrorBody, SolveRequest};
use crate::state::AppState;
use crate::upstream::CompletionRequest;

/// Maximum accepted question length in bytes.
pub const MAX_QUESTION_BYTES: usize = 32 * 1024; // 32 KiB

#[derive(OpenApi)]
#[openapi(paths(solve), components(schemas(SolveRequest, ErrorBody)))]
pub struct SolveApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/solve", post(solve))
}

/// Solve a math problem (`POST /api/solve`).
///
/// The answer streams as `data: <fragment>` events followed by
/// `data: [DONE]`.
#[utoipa::path(
    post,
    path = "/api/solve",
    tag = "solve",
    request_body = SolveRequest,
    responses(
        (status = 200, description = "Answer stream", content_type = "text/event-stream", body = String),
        (status = 400, description = "Empty question", content_type = "text/plain", body = String),
        (status = 429, description = "Too many requests", body = ErrorBody),
        (status = 500, description = "Internal Server Error", body = ErrorBody),
    )
)]
pub async fn solve(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Response, ServerError> {
    let req: SolveRequest = serde_json::from_slice(&body)?;

    let question = req.question.unwrap_or_default();
    if question.trim().is_empty() {
        return Err(ServerError::EmptyQuestion);
    }
    if question.len() > MAX_QUESTION_BYTES {
        return Err(ServerError::QuestionTooLarge {
            len: question.len(),
            max: MAX_QUESTION_BYTES,
        });
    }

    debug!(question_len = question.len(), model = %state.config.model, "solve request");

    let request = CompletionRequest {
        model: state.config.model.clone(),
        system: Arc::clone(&state.system_prompt),
        question,
        sampling: state.config.sampling(),
    };

    let frames = relay::start(state.backend.as_ref(), request, state.config.stream_buffer).await?;
    Ok(relay::into_sse(frames))
}
