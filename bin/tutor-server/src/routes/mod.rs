//! Axum router construction.
//!
//! [`build`] assembles the complete application router:
//! - `/api/solve` and `/api/render` behind the rate-limit gate
//! - the chat page at `/` and the `/health` probe
//! - optional Swagger UI / OpenAPI document (`TUTOR_ENABLE_SWAGGER=false` disables it)
//! - CORS and per-request trace-id layers around everything

pub mod doc;
mod health;
mod page;
mod render;
mod solve;

use axum::{Router, middleware};
use std::sync::Arc;
use tower::ServiceBuilder;
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::{cors, rate_limit, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .merge(solve::router())
        .merge(render::router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit,
        ));

    let mut app = Router::new()
        .merge(api_router)
        .merge(health::router())
        .merge(page::router());

    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    app
        // Outermost layers execute first on the way in.
        .layer(ServiceBuilder::new().layer(cors::cors_layer(&state)))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            trace::trace_middleware,
        ))
        .with_state(state)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
