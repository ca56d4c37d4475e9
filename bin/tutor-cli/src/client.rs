//! HTTP client for `POST /api/solve`.

use std::fmt::Display;
use std::time::Duration;

use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use thiserror::Error;
use tracing::debug;
use tutor_types::{SseDecoder, SseFrame};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server rejected the question ({status}): {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("rate limited; retry after {}", retry_after.map(|s| format!("{s}s")).unwrap_or_else(|| "a while".into()))]
    RateLimited { retry_after: Option<u64> },

    #[error("stream broke: {0}")]
    Body(String),

    #[error("stream ended before completion")]
    Truncated,
}

#[derive(Debug, Clone)]
pub struct SolveClient {
    http: reqwest::Client,
    endpoint: String,
}

impl SolveClient {
    pub fn new(server: &str, connect_timeout: Duration) -> Result<Self, ClientError> {
        // No overall timeout: answers stream for minutes.
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/api/solve", server.trim_end_matches('/')),
        })
    }

    /// Send `question` and return the response once the stream is open.
    pub async fn open(&self, question: &str) -> Result<reqwest::Response, ClientError> {
        let resp = self
            .http
            .post(&self.endpoint)
            .json(&serde_json::json!({ "question": question }))
            .send()
            .await?;

        let status = resp.status();
        debug!(%status, endpoint = %self.endpoint, "solve response");
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ClientError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Rejected { status, body });
        }
        Ok(resp)
    }
}

/// Decode an SSE body, handing each fragment to `on_fragment` in order.
///
/// Succeeds only when the `[DONE]` sentinel arrives; a body that closes
/// without it counts as a broken stream.
pub async fn read_frames<S, B, E>(
    mut body: S,
    mut on_fragment: impl FnMut(&str),
) -> Result<(), ClientError>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut decoder = SseDecoder::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| ClientError::Body(e.to_string()))?;
        for frame in decoder.feed(chunk.as_ref()) {
            match frame {
                SseFrame::Data(text) => on_fragment(&text),
                SseFrame::Done => return Ok(()),
            }
        }
    }
    Err(ClientError::Truncated)
}
