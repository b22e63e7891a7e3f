//! Error types for the Anthropic client.

use thiserror::Error;

/// Result type for Anthropic client operations.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Anthropic client errors.
///
/// `Api` keeps the HTTP status so callers can classify failures for
/// retry decisions without string matching.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Configuration error (missing API key, invalid settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network error (connection failed, reset mid-stream)
    #[error("Network error: {0}")]
    Network(String),

    /// Call exceeded its time ceiling
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// API error (non-2xx response)
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Parse error (invalid JSON, unexpected response format)
    #[error("Parse error: {0}")]
    Parse(String),
}

impl LlmError {
    /// Whether retrying this error can plausibly succeed.
    ///
    /// Rate limiting (429), overload (529), server errors (5xx), network
    /// failures, and timeouts are transient; everything else is not.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Network(_) | LlmError::Timeout(_) => true,
            LlmError::Api { status, .. } => {
                *status == 429 || *status == 529 || (500..=599).contains(status)
            }
            _ => false,
        }
    }

    /// Whether this is a rate-limit response, which warrants a longer
    /// fixed delay than the usual exponential backoff.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, LlmError::Api { status: 429, .. })
    }
}
