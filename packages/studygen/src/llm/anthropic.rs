//! Anthropic implementation of the `Llm` trait.

use async_trait::async_trait;
use futures::StreamExt;
use tracing::debug;

use anthropic_client::{AnthropicClient, CompletionRequest, LlmError};

use super::{Llm, LlmRequest};

/// `Llm` backed by the Anthropic Messages API.
#[derive(Clone)]
pub struct AnthropicLlm {
    client: AnthropicClient,
}

impl AnthropicLlm {
    pub fn new(client: AnthropicClient) -> Self {
        Self { client }
    }

    /// Create from environment variable `ANTHROPIC_API_KEY`.
    pub fn from_env() -> Result<Self, LlmError> {
        Ok(Self::new(AnthropicClient::from_env()?))
    }

    fn to_request(request: LlmRequest) -> CompletionRequest {
        let mut completion =
            CompletionRequest::new(request.model, request.prompt, request.max_tokens);
        if let Some(system) = request.system {
            completion = completion.with_system(system);
        }
        completion
    }
}

#[async_trait]
impl Llm for AnthropicLlm {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
        let completion = self.client.complete(Self::to_request(request)).await?;
        Ok(completion.text)
    }

    async fn complete_streaming(
        &self,
        request: LlmRequest,
        on_progress: &(dyn Fn(usize) + Send + Sync),
    ) -> Result<String, LlmError> {
        let model = request.model.clone();
        let mut stream = self.client.complete_stream(Self::to_request(request)).await?;

        let mut accumulated = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if chunk.done {
                break;
            }
            accumulated.push_str(&chunk.delta);
            on_progress(accumulated.chars().count());
        }

        debug!(model = %model, chars = accumulated.len(), "streamed completion finished");
        Ok(accumulated)
    }
}
