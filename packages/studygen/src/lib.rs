//! Content-preserving study guide restructuring.
//!
//! Given a chapter's markdown study guide, the pipeline extracts an
//! exhaustive fact checklist and restructures the guide concurrently,
//! verifies the restructured output against the checklist with a cheaper
//! model, patches any missing facts back in, and runs a second polish
//! pass before persisting the result as a new chapter record.
//!
//! # Example
//!
//! ```rust,ignore
//! use studygen::{AnthropicLlm, ChapterInput, Pipeline, PipelineConfig, RestructureOptions};
//!
//! let llm = Arc::new(AnthropicLlm::from_env()?);
//! let pipeline = Pipeline::new(llm, sink, PipelineConfig::default());
//!
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! tokio::spawn(async move {
//!     while let Some(event) = rx.recv().await {
//!         println!("{}", serde_json::to_string(&event)?);
//!     }
//! });
//! pipeline.run(chapter, RestructureOptions::default(), tx).await?;
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod llm;
pub mod pipeline;
pub mod retry;
pub mod testing;

pub use config::{token_budget, CompressionTarget, PipelineConfig};
pub use error::{PipelineError, Result};
pub use events::{FailureKind, PipelineEvent, StepKind};
pub use llm::{AnthropicLlm, Llm, LlmRequest};
pub use pipeline::{
    ChapterInput, ChapterSink, Pipeline, RestructureOptions, RestructuredGuide, RunOutcome,
    VerifierReport,
};
pub use retry::RetryPolicy;
