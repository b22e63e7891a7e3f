//! Verifier response parsing.
//!
//! The verifier is a binary oracle: either the sentinel line meaning
//! "nothing missing", or a marker line followed by bulleted facts.
//! Anything else is surfaced as `VerifierUnparseable`, never silently
//! treated as complete.

use crate::error::{PipelineError, Result};

/// Fixed literal the verifier emits to mean "no missing facts",
/// matched by exact prefix.
pub const ALL_PRESENT_SENTINEL: &str = "ALL_FACTS_PRESENT";

/// Marker line introducing the bulleted missing-fact list.
pub const MISSING_MARKER: &str = "MISSING FACTS:";

/// Parsed verifier verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifierReport {
    /// Every checklist item is recoverable from the document
    Complete,
    /// Facts judged absent, one entry per bullet
    Missing(Vec<String>),
}

impl VerifierReport {
    pub fn is_complete(&self) -> bool {
        matches!(self, VerifierReport::Complete)
    }

    pub fn missing_count(&self) -> usize {
        match self {
            VerifierReport::Complete => 0,
            VerifierReport::Missing(facts) => facts.len(),
        }
    }
}

/// Parse a raw verifier response into a report.
pub fn parse_verifier_response(response: &str) -> Result<VerifierReport> {
    let trimmed = response.trim();
    let first_line = trimmed.lines().next().unwrap_or("").trim();

    if first_line.starts_with(ALL_PRESENT_SENTINEL) {
        return Ok(VerifierReport::Complete);
    }

    if first_line.starts_with(MISSING_MARKER) {
        let facts: Vec<String> = trimmed
            .lines()
            .skip(1)
            .filter_map(|line| line.trim().strip_prefix("- "))
            .map(|fact| fact.trim().to_string())
            .filter(|fact| !fact.is_empty())
            .collect();

        if facts.is_empty() {
            return Err(PipelineError::VerifierUnparseable {
                snippet: snippet(trimmed),
            });
        }
        return Ok(VerifierReport::Missing(facts));
    }

    Err(PipelineError::VerifierUnparseable {
        snippet: snippet(trimmed),
    })
}

fn snippet(response: &str) -> String {
    response.chars().take(120).collect()
}
