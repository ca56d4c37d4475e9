use crate::routes::{health, render, solve};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "tutor-server",
        description = "Streaming math tutor API",
        version = "0.1.0",
    ),
    tags(
        (name = "solve", description = "Streamed worked solutions"),
        (name = "render", description = "Markdown and LaTeX rendering"),
        (name = "health", description = "Liveness"),
    )
)]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(solve::SolveApi::openapi());
    root.merge(render::RenderApi::openapi());
    root.merge(health::HealthApi::openapi());
    root
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn every_endpoint_is_documented() {
        let doc = get_docs();
        for path in ["/api/solve", "/api/render", "/health"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
