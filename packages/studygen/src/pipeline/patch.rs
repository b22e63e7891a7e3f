//! Deterministic post-check for the patch step.
//!
//! The "insertion only" constraint is communicated to the LLM in the
//! prompt, which guarantees nothing. The cheap mechanical check here is
//! heading containment: every markdown heading present before patching
//! must still be present after.

use crate::error::{PipelineError, Result};

/// Markdown heading lines of a document, trimmed.
pub fn headings(document: &str) -> Vec<&str> {
    document
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('#'))
        .collect()
}

/// Verify that no heading of `before` was dropped by the patch.
pub fn check_headings_preserved(before: &str, after: &str) -> Result<()> {
    let after_headings: std::collections::HashSet<&str> = headings(after).into_iter().collect();

    let mut missing: Vec<String> = headings(before)
        .into_iter()
        .filter(|heading| !after_headings.contains(heading))
        .map(str::to_string)
        .collect();
    missing.dedup();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::PatchDroppedContent {
            missing_headings: missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUIDE: &str = "\
## Overview
Chest CT basics.

## Mnemonics
- I GET SMASHED

## Cheat sheet
One-liners.
";

    #[test]
    fn test_headings_extracted() {
        assert_eq!(
            headings(GUIDE),
            vec!["## Overview", "## Mnemonics", "## Cheat sheet"]
        );
    }

    #[test]
    fn test_pure_insertion_passes() {
        let patched = GUIDE.replace(
            "- I GET SMASHED",
            "- I GET SMASHED\n- WES sign: wall-echo-shadow",
        );
        assert!(check_headings_preserved(GUIDE, &patched).is_ok());
    }

    #[test]
    fn test_dropped_heading_detected() {
        let broken = GUIDE.replace("## Mnemonics\n- I GET SMASHED\n", "");
        let err = check_headings_preserved(GUIDE, &broken).unwrap_err();
        match err {
            PipelineError::PatchDroppedContent { missing_headings } => {
                assert_eq!(missing_headings, vec!["## Mnemonics"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_reindented_heading_still_counts() {
        let patched = GUIDE.replace("## Cheat sheet", "  ## Cheat sheet");
        assert!(check_headings_preserved(GUIDE, &patched).is_ok());
    }
}
