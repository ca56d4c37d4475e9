use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

pub static X_TRACE_ID: &str = "x-trace-id";

/// Request bodies above this size are never logged.
const MAX_LOGGED_BODY: usize = 1024;

/// Per-request span with a trace id, request logging and latency.
///
/// Response bodies pass through untouched so SSE streams reach the client
/// frame by frame; the logged latency is time-to-headers for streaming
/// responses.
pub async fn trace_middleware(
    State(_state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start_time = Instant::now();

    // 1. Take the caller's trace id or mint one.
    let trace_id = req
        .headers()
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    let method = req.method().clone();
    let path = req.uri().path().to_string();

    // 2. Everything below runs inside the request span.
    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %method,
        path = %path,
    );

    async move {
        info!("→ request started");
        let (parts, body) = req.into_parts();

        let body = match log_request_body(&parts.headers, body).await {
            Ok(body) => body,
            Err(rejection) => return rejection,
        };
        let mut req = Request::from_parts(parts, body);

        let trace_header = HeaderValue::from_str(&trace_id.to_string()).ok();
        if let Some(value) = trace_header.clone() {
            req.headers_mut().insert(X_TRACE_ID, value);
        }

        let mut response = next.run(req).await;

        if let Some(value) = trace_header {
            response.headers_mut().insert(X_TRACE_ID, value);
        }

        info!(
            status = response.status().as_u16(),
            latency_ms = start_time.elapsed().as_millis(),
            "← response headers sent"
        );

        response
    }
    .instrument(span)
    .await
}

/// Log the request body when it is small JSON, otherwise pass it through.
///
/// Only bodies that declare a `Content-Length` within [`MAX_LOGGED_BODY`]
/// are read, and the read is capped at that size.  Everything else reaches
/// the handler unbuffered.
async fn log_request_body(headers: &HeaderMap, body: Body) -> Result<Body, Response> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"));
    let declared_len = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());

    match declared_len {
        Some(len) if is_json && len <= MAX_LOGGED_BODY => {}
        Some(len) if len > 0 => {
            info!(size = len, "request body not logged");
            return Ok(body);
        }
        _ => return Ok(body),
    }

    let bytes = match Limited::new(body, MAX_LOGGED_BODY).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            warn!(limit = MAX_LOGGED_BODY, "request body exceeds its content-length");
            return Err(StatusCode::PAYLOAD_TOO_LARGE.into_response());
        }
        Err(e) => {
            warn!(error = %e, "failed to read request body");
            return Err((StatusCode::BAD_REQUEST, "failed to read request body").into_response());
        }
    };

    if let Ok(text) = std::str::from_utf8(&bytes) {
        info!("request body: {}", text);
    }
    Ok(Body::from(bytes))
}

#[cfg(test)]
mod test {
    use super::*;
    use bytes::Bytes;
    use futures::stream;

    fn json_headers(len: usize) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
        headers
    }

    async fn bytes_of(body: Body) -> Vec<u8> {
        body.collect().await.unwrap().to_bytes().to_vec()
    }

    #[tokio::test]
    async fn small_json_body_is_kept_intact() {
        let payload = br#"{"question":"2x = 4"}"#;
        let body = log_request_body(&json_headers(payload.len()), Body::from(&payload[..]))
            .await
            .unwrap();
        assert_eq!(bytes_of(body).await, payload);
    }

    #[tokio::test]
    async fn large_body_passes_through_unread() {
        let payload = vec![b'x'; MAX_LOGGED_BODY * 64];
        let body = log_request_body(&json_headers(payload.len()), Body::from(payload.clone()))
            .await
            .unwrap();
        assert_eq!(bytes_of(body).await.len(), payload.len());
    }

    #[tokio::test]
    async fn body_without_length_is_not_buffered() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let body = log_request_body(&headers, Body::from("{}")).await.unwrap();
        assert_eq!(bytes_of(body).await, b"{}");
    }

    #[tokio::test]
    async fn understated_length_is_413() {
        let payload = vec![b'x'; MAX_LOGGED_BODY + 1];
        let rejection = log_request_body(&json_headers(10), Body::from(payload))
            .await
            .unwrap_err();
        assert_eq!(rejection.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn read_error_is_400_not_an_empty_body() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"{\"question\"")),
            Err(std::io::Error::other("connection reset")),
        ];
        let body = Body::from_stream(stream::iter(chunks));
        let rejection = log_request_body(&json_headers(64), body).await.unwrap_err();
        assert_eq!(rejection.status(), StatusCode::BAD_REQUEST);
    }
}
