//! LLM trait for pipeline text generation.
//!
//! The trait abstracts the one capability the pipeline needs (prompt in,
//! text out) so the controller can be driven by a mock in tests.
//! Implementations wrap a specific provider and its wire format.

mod anthropic;

pub use anthropic::AnthropicLlm;

use async_trait::async_trait;

use anthropic_client::LlmError;

/// A single generation request.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
}

impl LlmRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            system: None,
            prompt: prompt.into(),
            max_tokens,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// LLM text generation seam.
#[async_trait]
pub trait Llm: Send + Sync {
    /// Generate the full completion for a request.
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError>;

    /// Generate with streaming, reporting accumulated character counts
    /// through `on_progress` as deltas arrive. The reports are UI
    /// feedback only and have no semantic effect.
    async fn complete_streaming(
        &self,
        request: LlmRequest,
        on_progress: &(dyn Fn(usize) + Send + Sync),
    ) -> Result<String, LlmError> {
        let text = self.complete(request).await?;
        on_progress(text.chars().count());
        Ok(text)
    }
}
