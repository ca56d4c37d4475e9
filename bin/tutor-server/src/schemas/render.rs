use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for `POST /api/render`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RenderRequest {
    /// Accumulated model output (markdown with LaTeX).
    pub text: String,
}

/// Response body for `POST /api/render`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RenderResponse {
    /// Sanitized HTML fragment.
    pub html: String,
}
