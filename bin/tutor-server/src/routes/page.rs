//! Single-page chat UI.

use axum::response::Html;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

const INDEX_HTML: &str = include_str!("../../assets/index.html");

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(index))
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}
