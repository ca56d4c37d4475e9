//! Markdown / LaTeX rendering endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::render::{RenderRequest, RenderResponse};
use crate::state::AppState;

/// Maximum accepted text length in bytes.
const MAX_RENDER_BYTES: usize = 512 * 1024; // 512 KiB

#[derive(OpenApi)]
#[openapi(paths(render), components(schemas(RenderRequest, RenderResponse)))]
pub struct RenderApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/render", post(render))
}

/// Render accumulated answer text to sanitized HTML (`POST /api/render`).
///
/// Malformed formulas come back as inline error markers, never as a failure.
#[utoipa::path(
    post,
    path = "/api/render",
    tag = "render",
    request_body = RenderRequest,
    responses(
        (status = 200, description = "Rendered HTML", body = RenderResponse),
        (status = 400, description = "Text too large"),
    )
)]
pub async fn render(
    State(_state): State<Arc<AppState>>,
    Json(req): Json<RenderRequest>,
) -> Result<Json<RenderResponse>, ServerError> {
    if req.text.len() > MAX_RENDER_BYTES {
        return Err(ServerError::BadRequest(format!(
            "text too large ({} bytes); maximum is {} bytes",
            req.text.len(),
            MAX_RENDER_BYTES,
        )));
    }

    // KaTeX runs synchronously inside an embedded JS engine.
    let html = tokio::task::spawn_blocking(move || tutor_render::render(&req.text))
        .await
        .map_err(|e| ServerError::Internal(format!("render task failed: {e}")))?;

    Ok(Json(RenderResponse { html }))
}
