use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for `POST /api/solve`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SolveRequest {
    /// The math problem, verbatim.  Missing or blank yields `400`.
    #[serde(default)]
    pub question: Option<String>,
}

/// JSON error body used by `429` and `500` responses.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}
