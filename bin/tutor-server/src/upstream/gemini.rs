//! Gemini streaming completions through `genai`.
//!
//! Credentials are resolved by `genai` from `GEMINI_API_KEY`.

use async_trait::async_trait;
use futures::StreamExt;
use genai::Client;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest, ChatStreamEvent};
use tracing::debug;

use super::{CompletionBackend, CompletionRequest, FragmentStream, UpstreamError};

#[derive(Debug, Clone, Default)]
pub struct GeminiBackend {
    client: Client,
}

impl GeminiBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CompletionBackend for GeminiBackend {
    async fn open_stream(&self, request: CompletionRequest) -> Result<FragmentStream, UpstreamError> {
        let chat_req = ChatRequest::new(vec![ChatMessage::user(request.question)])
            .with_system(request.system.to_string());

        let options = ChatOptions::default()
            .with_temperature(request.sampling.temperature)
            .with_top_p(request.sampling.top_p)
            .with_max_tokens(request.sampling.max_output_tokens);

        debug!(model = %request.model, "opening model stream");
        let response = self
            .client
            .exec_chat_stream(request.model.as_str(), chat_req, Some(&options))
            .await
            .map_err(|e| UpstreamError::Open(e.to_string()))?;

        // Only answer text is relayed; start/end markers and reasoning are not.
        let fragments = response.stream.filter_map(|event| async move {
            match event {
                Ok(ChatStreamEvent::Chunk(chunk)) => Some(Ok(chunk.content)),
                Ok(_) => None,
                Err(e) => Some(Err(UpstreamError::Stream(e.to_string()))),
            }
        });

        Ok(fragments.boxed())
    }
}
