//! Rate-limit gate for `/api/*`.
//!
//! Attached to every API route but only counts requests whose path starts
//! with `/api/solve`; everything else passes straight through.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::error::ServerError;
use crate::limiter::Decision;
use crate::state::AppState;

pub const LIMITED_PREFIX: &str = "/api/solve";

/// Key used when no client address can be determined.
pub const ANONYMOUS_CLIENT: &str = "anonymous";

pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !req.uri().path().starts_with(LIMITED_PREFIX) {
        return next.run(req).await;
    }

    let key = client_key(&req, state.config.trust_forwarded);
    match state.limiter.check(&key) {
        Decision::Allow => next.run(req).await,
        Decision::Reject { retry_after_secs } => {
            warn!(client = %key, retry_after_secs, "rate limit exceeded");
            ServerError::RateLimited { retry_after_secs }.into_response()
        }
    }
}

/// Identify the caller: forwarded headers when trusted, else the peer IP.
fn client_key(req: &Request<Body>, trust_forwarded: bool) -> String {
    if trust_forwarded {
        if let Some(ip) = forwarded_ip(req.headers()) {
            return ip;
        }
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| ANONYMOUS_CLIENT.to_owned())
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let from_xff = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let from_real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    from_xff.or_else(from_real_ip).map(str::to_owned)
}

#[cfg(test)]
mod test {
    use super::*;

    fn request_with(headers: &[(&str, &str)], peer: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/api/solve");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        let mut req = builder.body(Body::empty()).unwrap();
        if let Some(peer) = peer {
            let addr: SocketAddr = peer.parse().unwrap();
            req.extensions_mut().insert(ConnectInfo(addr));
        }
        req
    }

    #[test]
    fn peer_address_is_the_default_key() {
        let req = request_with(&[("x-forwarded-for", "9.9.9.9")], Some("10.0.0.7:5123"));
        assert_eq!(client_key(&req, false), "10.0.0.7");
    }

    #[test]
    fn forwarded_for_wins_when_trusted() {
        let req = request_with(&[("x-forwarded-for", "203.0.113.5, 10.0.0.1")], Some("10.0.0.7:5123"));
        assert_eq!(client_key(&req, true), "203.0.113.5");
    }

    #[test]
    fn real_ip_is_the_fallback_header() {
        let req = request_with(&[("x-real-ip", "198.51.100.2")], None);
        assert_eq!(client_key(&req, true), "198.51.100.2");
    }

    #[test]
    fn unknown_client_is_anonymous() {
        let req = request_with(&[], None);
        assert_eq!(client_key(&req, true), ANONYMOUS_CLIENT);
    }
}
