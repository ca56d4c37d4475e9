//! Upstream → SSE relay.
//!
//! [`start`] opens the model stream and spawns a producer task that copies
//! fragments into a bounded channel.  [`into_sse`] turns the receiving half
//! into the HTTP response body.  Fragments keep their order and boundaries:
//! each becomes exactly one SSE event.  A completed stream ends with one
//! `[DONE]` event; a failed one ends with an error item, which aborts the
//! response body without a sentinel.

use std::borrow::Cow;

use axum::http::header;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, debug, error, info};
use tutor_types::DONE_SENTINEL;

use crate::upstream::{CompletionBackend, CompletionRequest, UpstreamError};

/// One item delivered from the producer to the response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayFrame {
    Fragment(String),
    Done,
}

pub type RelayItem = Result<RelayFrame, UpstreamError>;

/// Open the upstream stream and start relaying it.
///
/// Errors opening the stream are returned directly so the caller can still
/// answer with a normal error response.
pub async fn start(
    backend: &dyn CompletionBackend,
    request: CompletionRequest,
    buffer: usize,
) -> Result<ReceiverStream<RelayItem>, UpstreamError> {
    let mut upstream = backend.open_stream(request).await?;
    let (tx, rx) = mpsc::channel(buffer.max(1));

    tokio::spawn(
        async move {
            let mut fragments = 0usize;
            while let Some(item) = upstream.next().await {
                match item {
                    Ok(text) if text.is_empty() => {}
                    Ok(text) => {
                        fragments += 1;
                        if tx.send(Ok(RelayFrame::Fragment(text))).await.is_err() {
                            debug!(fragments, "client went away; dropping model stream");
                            return;
                        }
                    }
                    Err(e) => {
                        error!(error = %e, fragments, "model stream failed mid-response");
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }
            info!(fragments, "model stream completed");
            let _ = tx.send(Ok(RelayFrame::Done)).await;
        }
        .in_current_span(),
    );

    Ok(ReceiverStream::new(rx))
}

/// Build the `text/event-stream` response for a relay.
pub fn into_sse<S>(frames: S) -> Response
where
    S: Stream<Item = RelayItem> + Send + 'static,
{
    let events = frames.map(|item| {
        item.map(|frame| match frame {
            RelayFrame::Fragment(text) => Event::default().data(sse_safe(&text)),
            RelayFrame::Done => Event::default().data(DONE_SENTINEL),
        })
    });

    (
        [(header::CONNECTION, "keep-alive")],
        Sse::new(events),
    )
        .into_response()
}

/// SSE field values cannot carry carriage returns; fold them into `\n`.
fn sse_safe(text: &str) -> Cow<'_, str> {
    if text.contains('\r') {
        Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(text)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures::stream;
    use http_body_util::BodyExt;
    use tutor_types::{SseDecoder, SseFrame};

    use crate::upstream::{FragmentStream, Sampling};

    /// Scripted backend: replays fixed fragments, optionally failing.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedBackend {
        pub fragments: Vec<String>,
        pub fail_mid_stream: bool,
        pub fail_open: bool,
        pub calls: AtomicUsize,
        pub last_request: Mutex<Option<CompletionRequest>>,
    }

    impl ScriptedBackend {
        pub(crate) fn new(fragments: &[&str]) -> Self {
            Self {
                fragments: fragments.iter().map(|s| s.to_string()).collect(),
                ..Self::default()
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn open_stream(
            &self,
            request: CompletionRequest,
        ) -> Result<FragmentStream, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request);
            if self.fail_open {
                return Err(UpstreamError::Open("scripted open failure".into()));
            }
            let mut items: Vec<Result<String, UpstreamError>> =
                self.fragments.iter().cloned().map(Ok).collect();
            if self.fail_mid_stream {
                items.push(Err(UpstreamError::Stream("scripted stream failure".into())));
            }
            Ok(stream::iter(items).boxed())
        }
    }

    pub(crate) fn request(question: &str) -> CompletionRequest {
        CompletionRequest {
            model: "test-model".into(),
            system: Arc::from("system"),
            question: question.into(),
            sampling: Sampling {
                temperature: 0.2,
                top_p: 0.8,
                max_output_tokens: 4096,
            },
        }
    }

    #[tokio::test]
    async fn fragments_arrive_in_order_then_done() {
        let backend = ScriptedBackend::new(&["#### 問題", "", "文の要約\n- ", "$x=2$"]);
        let frames: Vec<RelayItem> = start(&backend, request("q"), 1)
            .await
            .unwrap()
            .collect()
            .await;

        let frames: Vec<RelayFrame> = frames.into_iter().map(Result::unwrap).collect();
        assert_eq!(
            frames,
            vec![
                RelayFrame::Fragment("#### 問題".into()),
                RelayFrame::Fragment("文の要約\n- ".into()),
                RelayFrame::Fragment("$x=2$".into()),
                RelayFrame::Done,
            ]
        );
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn mid_stream_failure_ends_with_error_and_no_done() {
        let backend = ScriptedBackend {
            fail_mid_stream: true,
            ..ScriptedBackend::new(&["a", "b"])
        };
        let frames: Vec<RelayItem> = start(&backend, request("q"), 4)
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(frames.len(), 3);
        assert!(matches!(frames[2], Err(UpstreamError::Stream(_))));
        assert!(frames.iter().all(|f| !matches!(f, Ok(RelayFrame::Done))));
    }

    #[tokio::test]
    async fn open_failure_is_returned_before_streaming() {
        let backend = ScriptedBackend {
            fail_open: true,
            ..ScriptedBackend::default()
        };
        let err = start(&backend, request("q"), 4).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Open(_)));
    }

    #[tokio::test]
    async fn sse_body_reassembles_to_sent_fragments() {
        let fragments = ["#### 結論\n", "$$\n\\boxed{x=2}\n$$", "\n\n--- end ---\n"];
        let backend = ScriptedBackend::new(&fragments);
        let frames = start(&backend, request("q"), 2).await.unwrap();
        let resp = into_sse(frames);

        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(resp.headers()[header::CACHE_CONTROL], "no-cache");
        assert_eq!(resp.headers()[header::CONNECTION], "keep-alive");

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let mut decoder = SseDecoder::new();
        let decoded = decoder.feed(&body);

        let mut expected: Vec<SseFrame> = fragments
            .iter()
            .map(|f| SseFrame::Data(f.to_string()))
            .collect();
        expected.push(SseFrame::Done);
        assert_eq!(decoded, expected);
        assert_eq!(decoded.iter().filter(|f| **f == SseFrame::Done).count(), 1);
    }

    #[tokio::test]
    async fn simple_fragment_is_one_data_line() {
        let backend = ScriptedBackend::new(&["x = 2"]);
        let frames = start(&backend, request("q"), 2).await.unwrap();
        let body = into_sse(frames).into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"data: x = 2\n\ndata: [DONE]\n\n");
    }

    #[tokio::test]
    async fn mid_stream_failure_aborts_body() {
        let backend = ScriptedBackend {
            fail_mid_stream: true,
            ..ScriptedBackend::new(&["partial"])
        };
        let frames = start(&backend, request("q"), 2).await.unwrap();
        let result = into_sse(frames).into_body().collect().await;
        assert!(result.is_err(), "body should end with an error");
    }

    #[tokio::test]
    async fn dropped_receiver_stops_producer() {
        let many: Vec<String> = (0..1000).map(|i| i.to_string()).collect();
        let refs: Vec<&str> = many.iter().map(String::as_str).collect();
        let backend = ScriptedBackend::new(&refs);
        let mut frames = start(&backend, request("q"), 1).await.unwrap();
        let first = frames.next().await.unwrap().unwrap();
        assert_eq!(first, RelayFrame::Fragment("0".into()));
        drop(frames);
        // Nothing to assert beyond not hanging: the producer exits on send error.
        tokio::task::yield_now().await;
    }

    #[test]
    fn carriage_returns_are_folded() {
        assert_eq!(sse_safe("a\r\nb\rc"), "a\nb\nc");
        assert!(matches!(sse_safe("plain\n"), Cow::Borrowed(_)));
    }
}
