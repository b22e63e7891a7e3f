//! Pipeline configuration and the token budget heuristic.

use std::time::Duration;

use crate::retry::RetryPolicy;

/// Output length target for the restructure prompt.
///
/// Callers can ask for compressed output or forbid shrinking entirely;
/// both behaviors are wanted by different study workflows, so this is a
/// knob rather than a constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompressionTarget {
    /// Compress prose to a fraction of the input word count.
    Ratio { min: f32, max: f32 },
    /// Output must be at least as long as the input.
    NoShrink,
}

impl Default for CompressionTarget {
    fn default() -> Self {
        Self::Ratio { min: 0.70, max: 0.85 }
    }
}

/// Tunables for a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Model for extraction, restructuring, and patching
    pub model: String,

    /// Cheaper/faster model for the verification step
    pub verifier_model: String,

    /// Words-to-tokens heuristic ratio for the output budget
    pub tokens_per_word: f32,

    /// Floor for the token budget
    pub min_tokens: u32,

    /// Cap for the token budget
    pub max_tokens: u32,

    /// Emit a streaming progress event roughly every this many characters
    pub progress_interval_chars: usize,

    /// Guard fired before the hosting platform's hard execution limit
    pub overall_deadline: Duration,

    /// Output length target for restructuring
    pub compression: CompressionTarget,

    /// Retry/backoff policy applied to every LLM call
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            verifier_model: "claude-3-5-haiku-latest".to_string(),
            tokens_per_word: 1.5,
            min_tokens: 1024,
            max_tokens: 8192,
            progress_interval_chars: 2000,
            overall_deadline: Duration::from_secs(290),
            compression: CompressionTarget::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Token budget for a generation step, scaled to input size.
///
/// Word count times the heuristic ratio, clamped to the configured range.
pub fn token_budget(input: &str, config: &PipelineConfig) -> u32 {
    let words = input.split_whitespace().count();
    let estimate = (words as f32 * config.tokens_per_word).ceil() as u32;
    estimate.clamp(config.min_tokens, config.max_tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_budget_scales_with_input() {
        let config = PipelineConfig {
            tokens_per_word: 1.5,
            min_tokens: 1,
            max_tokens: 1_000_000,
            ..Default::default()
        };

        assert_eq!(token_budget("one two three four", &config), 6);
    }

    #[test]
    fn test_token_budget_floor() {
        let config = PipelineConfig::default();
        assert_eq!(token_budget("short", &config), config.min_tokens);
    }

    #[test]
    fn test_token_budget_cap() {
        let config = PipelineConfig::default();
        let long_input = "word ".repeat(100_000);
        assert_eq!(token_budget(&long_input, &config), config.max_tokens);
    }

    #[test]
    fn test_default_compression_is_the_later_prompt_revision() {
        match CompressionTarget::default() {
            CompressionTarget::Ratio { min, max } => {
                assert!((min - 0.70).abs() < f32::EPSILON);
                assert!((max - 0.85).abs() < f32::EPSILON);
            }
            CompressionTarget::NoShrink => panic!("default should compress"),
        }
    }
}
