//! Progress events emitted by a pipeline run.
//!
//! A tagged union rather than free-text messages, so clients can
//! exhaustively pattern-match. Every variant carries the run id, so
//! multiplexed or logged event streams stay disambiguable.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;

/// Which pipeline step a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Extracting,
    Restructuring,
    Verifying,
    Patching,
    Saving,
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepKind::Extracting => "extracting",
            StepKind::Restructuring => "restructuring",
            StepKind::Verifying => "verifying",
            StepKind::Patching => "patching",
            StepKind::Saving => "saving",
        };
        f.write_str(s)
    }
}

/// Structured failure classification for terminal error events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Provider error that survived the retry policy
    Provider,
    /// A single call exceeded its time ceiling (after retries)
    Timeout,
    /// The run-wide deadline guard fired
    DeadlineExceeded,
    /// Verifier output matched neither expected shape
    VerifierUnparseable,
    /// Patch output failed the heading-containment post-check
    PatchDroppedContent,
    /// Saving the result failed
    Persistence,
}

impl From<&PipelineError> for FailureKind {
    fn from(err: &PipelineError) -> Self {
        use anthropic_client::LlmError;
        match err {
            PipelineError::Llm(LlmError::Timeout(_)) => FailureKind::Timeout,
            PipelineError::Llm(_) => FailureKind::Provider,
            PipelineError::VerifierUnparseable { .. } => FailureKind::VerifierUnparseable,
            PipelineError::PatchDroppedContent { .. } => FailureKind::PatchDroppedContent,
            PipelineError::Persist(_) => FailureKind::Persistence,
            PipelineError::DeadlineExceeded => FailureKind::DeadlineExceeded,
        }
    }
}

/// One event in a pipeline run's stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    Started {
        run_id: Uuid,
        chapter_id: Uuid,
    },
    Progress {
        run_id: Uuid,
        step: StepKind,
        message: String,
        /// Characters streamed so far, for UI feedback only
        #[serde(skip_serializing_if = "Option::is_none")]
        chars: Option<u64>,
    },
    Completed {
        run_id: Uuid,
        new_chapter_id: Uuid,
        original_chapter_id: Uuid,
        facts_restored: usize,
        message: String,
    },
    Failed {
        run_id: Uuid,
        kind: FailureKind,
        detail: String,
    },
}

impl PipelineEvent {
    /// The run this event belongs to.
    pub fn run_id(&self) -> Uuid {
        match self {
            PipelineEvent::Started { run_id, .. }
            | PipelineEvent::Progress { run_id, .. }
            | PipelineEvent::Completed { run_id, .. }
            | PipelineEvent::Failed { run_id, .. } => *run_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_is_tagged() {
        let run_id = Uuid::new_v4();
        let event = PipelineEvent::Progress {
            run_id,
            step: StepKind::Verifying,
            message: "Checking fact coverage".into(),
            chars: None,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["step"], "verifying");
        assert_eq!(json["run_id"], run_id.to_string());
        assert!(json.get("chars").is_none());
    }

    #[test]
    fn test_failure_kind_mapping() {
        use anthropic_client::LlmError;

        let kind: FailureKind = (&PipelineError::DeadlineExceeded).into();
        assert_eq!(kind, FailureKind::DeadlineExceeded);

        let kind: FailureKind =
            (&PipelineError::Llm(LlmError::Timeout(120))).into();
        assert_eq!(kind, FailureKind::Timeout);

        let kind: FailureKind = (&PipelineError::VerifierUnparseable {
            snippet: "??".into(),
        })
            .into();
        assert_eq!(kind, FailureKind::VerifierUnparseable);
    }

    #[test]
    fn test_failed_event_round_trips() {
        let event = PipelineEvent::Failed {
            run_id: Uuid::new_v4(),
            kind: FailureKind::Provider,
            detail: "API error (500): boom".into(),
        };

        let json = serde_json::to_string(&event).unwrap();
        let back: PipelineEvent = serde_json::from_str(&json).unwrap();
        match back {
            PipelineEvent::Failed { kind, .. } => assert_eq!(kind, FailureKind::Provider),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
