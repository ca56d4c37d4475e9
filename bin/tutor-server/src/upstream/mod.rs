//! Model backend abstraction.
//!
//! [`CompletionBackend`] is the seam between the relay and whatever serves
//! completions.  The production implementation is [`gemini::GeminiBackend`];
//! tests swap in a scripted backend.

pub mod gemini;

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

pub use gemini::GeminiBackend;

/// Sampling parameters applied to every call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub temperature: f64,
    pub top_p: f64,
    pub max_output_tokens: u32,
}

/// One streaming generation call: a system instruction and a single user turn.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub system: Arc<str>,
    pub question: String,
    pub sampling: Sampling,
}

/// Text fragments in the order the model produced them.
pub type FragmentStream = BoxStream<'static, Result<String, UpstreamError>>;

#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The call could not be started (auth, network, rejected request).
    #[error("failed to open model stream: {0}")]
    Open(String),

    /// The stream broke after it started.
    #[error("model stream failed: {0}")]
    Stream(String),
}

#[async_trait]
pub trait CompletionBackend: Send + Sync + Debug {
    /// Start a generation and return its fragment stream.
    async fn open_stream(&self, request: CompletionRequest) -> Result<FragmentStream, UpstreamError>;
}
