//! Pure Anthropic Messages API client
//!
//! A clean, minimal client for the Anthropic API with no domain-specific
//! logic. Supports plain and streaming message completions.
//!
//! # Example
//!
//! ```rust,ignore
//! use anthropic_client::{AnthropicClient, CompletionRequest};
//!
//! let client = AnthropicClient::from_env()?;
//!
//! // Plain completion
//! let completion = client
//!     .complete(CompletionRequest::new("claude-3-5-haiku-latest", "Hello!", 256))
//!     .await?;
//!
//! // Streaming completion
//! let mut stream = client
//!     .complete_stream(CompletionRequest::new("claude-sonnet-4-20250514", "Hello!", 4096))
//!     .await?;
//! while let Some(chunk) = stream.next().await {
//!     print!("{}", chunk?.delta);
//! }
//! ```

pub mod error;
pub mod streaming;
pub mod types;

pub use error::{LlmError, Result};
pub use streaming::{MessageDelta, MessageStream};
pub use types::*;

use reqwest::Client;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_API_VERSION: &str = "2023-06-01";

/// Pure Anthropic API client.
#[derive(Clone)]
pub struct AnthropicClient {
    http_client: Client,
    api_key: String,
    base_url: String,
    version: String,
}

impl AnthropicClient {
    /// Create a new client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            version: DEFAULT_API_VERSION.to_string(),
        }
    }

    /// Create from environment variable `ANTHROPIC_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| LlmError::Config("ANTHROPIC_API_KEY not set".into()))?;
        Ok(Self::new(api_key))
    }

    /// Set a custom base URL (for proxies, gateways).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the `anthropic-version` header value.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Message completion.
    ///
    /// Send messages to the Messages API and get the full response back.
    pub async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        let start = std::time::Instant::now();

        let response = self
            .http_client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.version)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Anthropic request failed");
                LlmError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.api_error(status.as_u16(), response).await);
        }

        let raw: types::MessageResponseRaw = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let text = raw
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .map(|block| block.text.as_str())
            .collect::<String>();

        debug!(
            model = %request.model,
            output_tokens = raw.usage.output_tokens,
            duration_ms = start.elapsed().as_millis(),
            "Anthropic message completion"
        );

        Ok(Completion {
            text,
            stop_reason: raw.stop_reason,
            usage: raw.usage,
        })
    }

    /// Streaming message completion.
    ///
    /// Send messages and get a stream of text deltas back, decoded from
    /// the API's SSE wire format.
    pub async fn complete_stream(&self, request: CompletionRequest) -> Result<MessageStream> {
        // Build JSON body with stream: true
        let mut body = serde_json::to_value(&request)
            .map_err(|e| LlmError::Parse(format!("Failed to serialize request: {}", e)))?;
        body["stream"] = serde_json::Value::Bool(true);

        let response = self
            .http_client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.version)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Anthropic streaming request failed");
                LlmError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.api_error(status.as_u16(), response).await);
        }

        Ok(MessageStream::new(response.bytes_stream()))
    }

    /// Convert a non-2xx response into an `LlmError::Api`, pulling the
    /// message out of the error body when it parses.
    async fn api_error(&self, status: u16, response: reqwest::Response) -> LlmError {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<types::ApiErrorRaw>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);

        warn!(status, message = %message, "Anthropic API error");
        LlmError::Api { status, message }
    }
}
