//! Typed errors for the restructuring pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use anthropic_client::LlmError;
use thiserror::Error;

/// Errors that can occur during a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// LLM call failed after the retry policy was exhausted
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    /// Verifier output matched neither expected shape.
    ///
    /// Surfaced as its own kind rather than silently treated as
    /// "nothing missing".
    #[error("verifier response unparseable: {snippet}")]
    VerifierUnparseable { snippet: String },

    /// Patch output lost headings that were present before patching
    #[error("patch dropped content: missing headings {missing_headings:?}")]
    PatchDroppedContent { missing_headings: Vec<String> },

    /// Persisting the restructured chapter failed
    #[error("persistence error: {0}")]
    Persist(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The run-wide guard fired before the platform's hard limit
    #[error("pipeline exceeded its overall deadline")]
    DeadlineExceeded,
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_conversion() {
        let llm_err = LlmError::Api {
            status: 429,
            message: "rate limited".into(),
        };
        let err: PipelineError = llm_err.into();
        assert!(matches!(err, PipelineError::Llm(_)));
    }

    #[test]
    fn test_display_includes_missing_headings() {
        let err = PipelineError::PatchDroppedContent {
            missing_headings: vec!["## Mnemonics".into()],
        };
        assert!(err.to_string().contains("## Mnemonics"));
    }
}
