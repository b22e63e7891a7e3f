//! LLM prompts for the restructuring pipeline.
//!
//! Four templates: fact extraction, restructuring, verification, and
//! patching. Placeholders are replaced by the `format_*` helpers.

use sha2::{Digest, Sha256};

use crate::config::CompressionTarget;
use crate::pipeline::verify::{ALL_PRESENT_SENTINEL, MISSING_MARKER};

/// Prompt for extracting an exhaustive fact checklist from a study guide.
pub const EXTRACT_FACTS_PROMPT: &str = r#"You are building an exam-day fact inventory from a radiology study guide.

Go through the document and list EVERY atomic fact as a checklist item, grouped under these headings:

## Anatomy
## Numeric thresholds & measurements
## Named signs
## Pathologies
## Associations & syndromes
## Differentials
## Classifications & grading
## Management & follow-up
## Mnemonics
## Pearls & pitfalls
## Links & references
## Comparisons
## Exam strategy

Rules:
1. One fact per line, formatted exactly as "- [ ] fact".
2. Be exhaustive. A number, a sign name, a mnemonic, an association, a table row — each is its own item.
3. Do not summarize or merge facts. Split compound statements into separate items.
4. Keep each item self-contained so it can be checked against another document in isolation.
5. Leave a category heading out if the document has nothing for it.
6. Output only the headings and checklist items, nothing else.

{language_instruction}

Document:
{document}"#;

/// Prompt for restructuring a study guide into the fixed section skeleton.
pub const RESTRUCTURE_PROMPT: &str = r#"Rewrite this radiology study guide into the ordered section skeleton below. Reorganize and improve the presentation; do not change the medicine.

Skeleton (keep this order, drop a section only if the source has nothing for it):
1. ## Overview — scope of the chapter, why it matters for the exam
2. ## Anatomy — relevant anatomy, variants, landmarks
3. ## Deep dives — one subsection per major topic, imaging findings first
4. ## Protocols — acquisition, contrast, dose where the source covers them
5. ## Differential tables — markdown tables, one row per entity
6. ## Comparisons — commonly-confused entity pairs, side by side
7. ## Mnemonics — every mnemonic from the source, with expansion
8. ## Rapid-fire self-test — short Q&A pairs drawn from the content
9. ## Final checklist — the must-know facts as "- [ ]" items
10. ## Cheat sheet — one-line-per-fact condensed summary

Rules:
1. EVERY fact, table row, callout, and link from the source must reappear somewhere in the output.
2. Merge duplicated facts into one statement instead of deleting them.
3. Keep markdown formatting: tables stay tables, links stay links.
4. {length_instruction}

{language_instruction}

Source document:
{document}"#;

/// Prompt for verifying the checklist against a restructured document.
pub const VERIFY_PROMPT: &str = r#"You are given a fact checklist and a document. Decide which checklist items are NOT recoverable from the document.

Count an item as present if its content is findable anywhere in the document, even reworded, merged with another fact, or moved to a table. Only report an item when its substance is genuinely absent.

Answer in exactly one of two shapes:
- If every item is present, reply with the single line: {sentinel}
- Otherwise reply with the line "{missing_marker}" followed by one "- " bullet per missing fact, copied from the checklist.

No other commentary.

Fact checklist:
{checklist}

Document:
{document}"#;

/// Prompt for splicing missing facts into a restructured document.
pub const PATCH_PROMPT: &str = r#"Insert each missing fact into the study guide at the most locally appropriate point, formatted consistently with the surrounding content (prose into prose, rows into tables, mnemonics into the mnemonics section).

Hard constraint: this is insertion only. Never remove, reorder, or reword existing content — every existing heading, sentence, table row, and link stays exactly where it is.

Return the complete patched document and nothing else.

{language_instruction}

Missing facts:
{missing_facts}

Study guide:
{document}"#;

/// Language directive appended to generation prompts.
pub fn language_instruction(language: Option<&str>) -> &'static str {
    match language {
        Some("fr") => "Réponds intégralement en français, en gardant les termes radiologiques consacrés.",
        _ => "Write in English.",
    }
}

fn length_instruction(compression: &CompressionTarget) -> String {
    match compression {
        CompressionTarget::Ratio { min, max } => format!(
            "Compress the prose so the output lands between {:.0}% and {:.0}% of the input word count. Cut filler words, never facts.",
            min * 100.0,
            max * 100.0
        ),
        CompressionTarget::NoShrink => {
            "The output must be at least as long as the input. Expand tables and add connective explanation rather than dropping anything.".to_string()
        }
    }
}

/// Generate a hash of the restructure prompt for tracking which revision
/// produced a stored chapter.
pub fn restructure_prompt_hash() -> String {
    let mut hasher = Sha256::new();
    hasher.update(RESTRUCTURE_PROMPT.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Format the fact extraction prompt.
pub fn format_extract_facts_prompt(document: &str, language: Option<&str>) -> String {
    EXTRACT_FACTS_PROMPT
        .replace("{language_instruction}", language_instruction(language))
        .replace("{document}", document)
}

/// Format the restructure prompt.
pub fn format_restructure_prompt(
    document: &str,
    language: Option<&str>,
    compression: &CompressionTarget,
) -> String {
    RESTRUCTURE_PROMPT
        .replace("{length_instruction}", &length_instruction(compression))
        .replace("{language_instruction}", language_instruction(language))
        .replace("{document}", document)
}

/// Format the verification prompt.
pub fn format_verify_prompt(checklist: &str, document: &str) -> String {
    VERIFY_PROMPT
        .replace("{sentinel}", ALL_PRESENT_SENTINEL)
        .replace("{missing_marker}", MISSING_MARKER)
        .replace("{checklist}", checklist)
        .replace("{document}", document)
}

/// Format the patch prompt.
pub fn format_patch_prompt(
    document: &str,
    missing_facts: &[String],
    language: Option<&str>,
) -> String {
    let facts_text = missing_facts
        .iter()
        .map(|fact| format!("- {}", fact))
        .collect::<Vec<_>>()
        .join("\n");

    PATCH_PROMPT
        .replace("{language_instruction}", language_instruction(language))
        .replace("{missing_facts}", &facts_text)
        .replace("{document}", document)
}
