//! Pipeline controller.
//!
//! Drives the five steps in order:
//!
//! `extracting+restructuring (parallel) → verifying → [patching] →
//! restructuring (polish) → [verifying → [patching]] → saving`
//!
//! Bracketed branches are skipped when the first verify pass reported
//! zero missing facts, so an already-complete output costs no extra
//! verify/patch calls. All state lives in the one run; nothing is
//! persisted until the final save, and the original chapter is never
//! overwritten.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;
use uuid::Uuid;

use crate::config::{token_budget, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::events::{PipelineEvent, StepKind};
use crate::llm::{Llm, LlmRequest};
use crate::pipeline::facts::count_checklist_items;
use crate::pipeline::patch::check_headings_preserved;
use crate::pipeline::prompts;
use crate::pipeline::verify::{parse_verifier_response, VerifierReport};
use crate::retry;

/// The chapter content a run operates on.
#[derive(Debug, Clone)]
pub struct ChapterInput {
    pub id: Uuid,
    pub source: String,
    pub number: i32,
    pub title: String,
    pub study_guide: String,
}

/// Per-request options.
#[derive(Debug, Clone, Default)]
pub struct RestructureOptions {
    /// Output language tag ("fr" for French, anything else is English)
    pub language: Option<String>,
}

/// The finished document handed to the persistence seam.
#[derive(Debug, Clone)]
pub struct RestructuredGuide {
    pub original_id: Uuid,
    pub source: String,
    pub number: i32,
    pub title: String,
    pub study_guide: String,
    pub language: Option<String>,
    /// Hash of the restructure prompt revision that produced this guide
    pub prompt_hash: String,
    pub facts_restored: usize,
}

/// Persistence seam for the final document.
///
/// Implementations must store the guide as a NEW record and return its
/// id; the original chapter row is never written.
#[async_trait]
pub trait ChapterSink: Send + Sync {
    async fn save_restructured(
        &self,
        guide: &RestructuredGuide,
    ) -> std::result::Result<Uuid, Box<dyn std::error::Error + Send + Sync>>;
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub new_chapter_id: Uuid,
    pub original_chapter_id: Uuid,
    pub facts_restored: usize,
}

/// The restructuring pipeline.
pub struct Pipeline {
    llm: Arc<dyn Llm>,
    sink: Arc<dyn ChapterSink>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(llm: Arc<dyn Llm>, sink: Arc<dyn ChapterSink>, config: PipelineConfig) -> Self {
        Self { llm, sink, config }
    }

    /// Run the full two-pass pipeline for one chapter.
    ///
    /// Progress flows through `events` (one channel per run, every event
    /// carrying the run id). The whole run races the configured overall
    /// deadline, which force-emits a terminal error before the hosting
    /// platform's own execution limit would kill the process. The
    /// terminal event is emitted here in all cases; the returned result
    /// mirrors it for callers that await the run directly.
    pub async fn run(
        &self,
        chapter: ChapterInput,
        opts: RestructureOptions,
        events: UnboundedSender<PipelineEvent>,
    ) -> Result<RunOutcome> {
        let run_id = Uuid::new_v4();
        let _ = events.send(PipelineEvent::Started {
            run_id,
            chapter_id: chapter.id,
        });
        info!(%run_id, chapter_id = %chapter.id, "restructure pipeline started");

        let result = match tokio::time::timeout(
            self.config.overall_deadline,
            self.run_inner(run_id, &chapter, &opts, &events),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(PipelineError::DeadlineExceeded),
        };

        match result {
            Ok(outcome) => {
                let _ = events.send(PipelineEvent::Completed {
                    run_id,
                    new_chapter_id: outcome.new_chapter_id,
                    original_chapter_id: chapter.id,
                    facts_restored: outcome.facts_restored,
                    message: format!(
                        "Restructured chapter saved, {} facts restored across both passes",
                        outcome.facts_restored
                    ),
                });
                info!(%run_id, new_chapter_id = %outcome.new_chapter_id, "restructure pipeline finished");
                Ok(outcome)
            }
            Err(error) => {
                let _ = events.send(PipelineEvent::Failed {
                    run_id,
                    kind: (&error).into(),
                    detail: error.to_string(),
                });
                Err(error)
            }
        }
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        chapter: &ChapterInput,
        opts: &RestructureOptions,
        events: &UnboundedSender<PipelineEvent>,
    ) -> Result<RunOutcome> {
        let config = &self.config;
        let language = opts.language.as_deref();
        let budget = token_budget(&chapter.study_guide, config);

        self.progress(events, run_id, StepKind::Extracting, "Extracting fact checklist".into());
        self.progress(events, run_id, StepKind::Restructuring, "Restructuring study guide".into());

        // Fan out: extraction and restructuring share no state and run
        // concurrently against the provider.
        let extract_prompt = prompts::format_extract_facts_prompt(&chapter.study_guide, language);
        let extract_fut = retry::call(&config.retry, || {
            self.llm.complete(LlmRequest::new(
                config.model.as_str(),
                extract_prompt.clone(),
                budget,
            ))
        });
        let restructure_fut =
            self.restructure(&chapter.study_guide, language, budget, run_id, events);

        let (checklist, mut guide) = match tokio::join!(extract_fut, restructure_fut) {
            (Ok(checklist), Ok(guide)) => (checklist, guide),
            (Err(error), _) => return Err(error.into()),
            (_, Err(error)) => return Err(error),
        };

        let fact_count = count_checklist_items(&checklist);
        self.progress(
            events,
            run_id,
            StepKind::Extracting,
            format!("Checklist ready with {} facts", fact_count),
        );

        // Pass 1: verify, patch only what the verifier flagged.
        self.progress(events, run_id, StepKind::Verifying, "Checking fact coverage".into());
        let report = self.verify(&checklist, &guide).await?;
        let first_pass_complete = report.is_complete();
        let mut facts_restored = 0usize;

        if let VerifierReport::Missing(missing) = report {
            self.progress(
                events,
                run_id,
                StepKind::Patching,
                format!("Restoring {} missing facts", missing.len()),
            );
            guide = self.patch(&guide, &missing, language, budget).await?;
            facts_restored += missing.len();
        }

        // Pass 2: a polish restructure integrates bolted-on insertions
        // smoothly; its verify/patch is skipped when pass 1 was already
        // complete.
        self.progress(events, run_id, StepKind::Restructuring, "Polishing restructured guide".into());
        guide = self.restructure(&guide, language, budget, run_id, events).await?;

        if !first_pass_complete {
            self.progress(events, run_id, StepKind::Verifying, "Re-checking fact coverage".into());
            let report = self.verify(&checklist, &guide).await?;
            if let VerifierReport::Missing(missing) = report {
                self.progress(
                    events,
                    run_id,
                    StepKind::Patching,
                    format!("Restoring {} missing facts", missing.len()),
                );
                guide = self.patch(&guide, &missing, language, budget).await?;
                facts_restored += missing.len();
            }
        }

        self.progress(events, run_id, StepKind::Saving, "Saving restructured chapter".into());
        let restructured = RestructuredGuide {
            original_id: chapter.id,
            source: chapter.source.clone(),
            number: chapter.number,
            title: chapter.title.clone(),
            study_guide: guide,
            language: opts.language.clone(),
            prompt_hash: prompts::restructure_prompt_hash(),
            facts_restored,
        };
        let new_chapter_id = self
            .sink
            .save_restructured(&restructured)
            .await
            .map_err(PipelineError::Persist)?;

        Ok(RunOutcome {
            run_id,
            new_chapter_id,
            original_chapter_id: chapter.id,
            facts_restored,
        })
    }

    /// One restructure call, streamed, with throttled character-count
    /// progress events.
    async fn restructure(
        &self,
        document: &str,
        language: Option<&str>,
        budget: u32,
        run_id: Uuid,
        events: &UnboundedSender<PipelineEvent>,
    ) -> Result<String> {
        let config = &self.config;
        let prompt = prompts::format_restructure_prompt(document, language, &config.compression);

        let reported = AtomicUsize::new(0);
        let interval = config.progress_interval_chars.max(1);
        let on_progress = |chars: usize| {
            let previous = reported.swap(chars, Ordering::Relaxed);
            if chars / interval > previous / interval {
                let _ = events.send(PipelineEvent::Progress {
                    run_id,
                    step: StepKind::Restructuring,
                    message: format!("{} characters generated", chars),
                    chars: Some(chars as u64),
                });
            }
        };

        let text = retry::call(&config.retry, || {
            self.llm.complete_streaming(
                LlmRequest::new(config.model.as_str(), prompt.clone(), budget),
                &on_progress,
            )
        })
        .await?;
        Ok(text)
    }

    /// One verify call against the cheaper model.
    async fn verify(&self, checklist: &str, guide: &str) -> Result<VerifierReport> {
        let config = &self.config;
        let prompt = prompts::format_verify_prompt(checklist, guide);
        // The verifier echoes at most the checklist back
        let budget = token_budget(checklist, config);

        let response = retry::call(&config.retry, || {
            self.llm.complete(LlmRequest::new(
                config.verifier_model.as_str(),
                prompt.clone(),
                budget,
            ))
        })
        .await?;
        parse_verifier_response(&response)
    }

    /// One patch call, post-checked for heading containment.
    async fn patch(
        &self,
        guide: &str,
        missing: &[String],
        language: Option<&str>,
        budget: u32,
    ) -> Result<String> {
        let config = &self.config;
        let prompt = prompts::format_patch_prompt(guide, missing, language);

        let patched = retry::call(&config.retry, || {
            self.llm.complete(LlmRequest::new(
                config.model.as_str(),
                prompt.clone(),
                budget,
            ))
        })
        .await?;

        check_headings_preserved(guide, &patched)?;
        Ok(patched)
    }

    fn progress(
        &self,
        events: &UnboundedSender<PipelineEvent>,
        run_id: Uuid,
        step: StepKind,
        message: String,
    ) {
        let _ = events.send(PipelineEvent::Progress {
            run_id,
            step,
            message,
            chars: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::sync::mpsc;

    use crate::events::FailureKind;
    use crate::retry::RetryPolicy;
    use crate::testing::{MemorySink, MockLlm};

    const SOURCE_GUIDE: &str = "\
## Overview
Gallbladder and biliary imaging.

## Signs
WES sign: wall-echo-shadow complex of a stone-filled gallbladder.
";

    const RESTRUCTURED: &str = "\
## Overview
Biliary imaging, reorganized.

## Deep dives
WES sign: wall-echo-shadow complex.

## Cheat sheet
- WES sign = contracted stone-filled gallbladder
";

    // Markers unique to each prompt template
    const EXTRACT: &str = "fact inventory";
    const RESTRUCTURE: &str = "section skeleton";
    const VERIFY: &str = "fact checklist and a document";
    const PATCH: &str = "insertion only";

    fn chapter() -> ChapterInput {
        ChapterInput {
            id: Uuid::new_v4(),
            source: "core-radiology".into(),
            number: 7,
            title: "Hepatobiliary".into(),
            study_guide: SOURCE_GUIDE.into(),
        }
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            retry: RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
                rate_limit_delay: Duration::from_millis(1),
                call_timeout: Duration::from_millis(500),
            },
            overall_deadline: Duration::from_secs(5),
            ..Default::default()
        }
    }

    fn pipeline(llm: Arc<MockLlm>, sink: Arc<MemorySink>) -> Pipeline {
        Pipeline::new(llm, sink, fast_config())
    }

    async fn drain(rx: &mut mpsc::UnboundedReceiver<PipelineEvent>) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_all_present_skips_patch_and_second_verify() {
        let llm = Arc::new(
            MockLlm::new()
                .with_response(EXTRACT, "- [ ] WES sign means wall-echo-shadow\n- [ ] CBD under 6 mm")
                .with_response(RESTRUCTURE, RESTRUCTURED)
                .with_response(VERIFY, "ALL_FACTS_PRESENT"),
        );
        let sink = Arc::new(MemorySink::new());
        let pipeline = pipeline(llm.clone(), sink.clone());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let outcome = pipeline
            .run(chapter(), RestructureOptions::default(), tx)
            .await
            .unwrap();

        assert_eq!(outcome.facts_restored, 0);
        // One verify in pass one, none in pass two
        assert_eq!(llm.calls_matching(VERIFY), 1);
        // No patch calls at all
        assert_eq!(llm.calls_matching(PATCH), 0);
        // Initial restructure plus the polish pass
        assert_eq!(llm.calls_matching(RESTRUCTURE), 2);
        assert_eq!(sink.saved().len(), 1);

        let events = drain(&mut rx).await;
        assert!(matches!(events.first(), Some(PipelineEvent::Started { .. })));
        assert!(matches!(events.last(), Some(PipelineEvent::Completed { .. })));
    }

    #[tokio::test]
    async fn test_missing_facts_patched_and_reverified() {
        let patched = format!("{}\n## Mnemonics\n- I GET SMASHED\n", RESTRUCTURED);
        let polished = patched.clone();

        let llm = Arc::new(
            MockLlm::new()
                .with_response(EXTRACT, "- [ ] WES sign\n- [ ] I GET SMASHED mnemonic")
                .with_response(RESTRUCTURE, RESTRUCTURED)
                .with_response(RESTRUCTURE, &polished)
                .with_response(VERIFY, "MISSING FACTS:\n- I GET SMASHED mnemonic")
                .with_response(VERIFY, "ALL_FACTS_PRESENT")
                .with_response(PATCH, &patched),
        );
        let sink = Arc::new(MemorySink::new());
        let pipeline = pipeline(llm.clone(), sink.clone());

        let (tx, _rx) = mpsc::unbounded_channel();
        let outcome = pipeline
            .run(chapter(), RestructureOptions::default(), tx)
            .await
            .unwrap();

        assert_eq!(outcome.facts_restored, 1);
        assert_eq!(llm.calls_matching(VERIFY), 2);
        assert_eq!(llm.calls_matching(PATCH), 1);

        let saved = sink.saved();
        assert_eq!(saved.len(), 1);
        assert!(saved[0].1.study_guide.contains("I GET SMASHED"));
        assert_eq!(saved[0].0, outcome.new_chapter_id);
    }

    #[tokio::test]
    async fn test_unparseable_verifier_output_fails_the_run() {
        let llm = Arc::new(
            MockLlm::new()
                .with_response(EXTRACT, "- [ ] WES sign")
                .with_response(RESTRUCTURE, RESTRUCTURED)
                .with_response(VERIFY, "the document looks mostly fine to me?"),
        );
        let sink = Arc::new(MemorySink::new());
        let pipeline = pipeline(llm, sink.clone());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let error = pipeline
            .run(chapter(), RestructureOptions::default(), tx)
            .await
            .unwrap_err();

        assert!(matches!(error, PipelineError::VerifierUnparseable { .. }));
        assert!(sink.saved().is_empty());

        let events = drain(&mut rx).await;
        match events.last() {
            Some(PipelineEvent::Failed { kind, .. }) => {
                assert_eq!(*kind, FailureKind::VerifierUnparseable)
            }
            other => panic!("expected Failed event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_patch_dropping_a_heading_fails_the_run() {
        let llm = Arc::new(
            MockLlm::new()
                .with_response(EXTRACT, "- [ ] WES sign")
                .with_response(RESTRUCTURE, RESTRUCTURED)
                .with_response(VERIFY, "MISSING FACTS:\n- CBD under 6 mm")
                // Patch response rewrote the document instead of inserting
                .with_response(PATCH, "## Something else entirely\nCBD under 6 mm\n"),
        );
        let sink = Arc::new(MemorySink::new());
        let pipeline = pipeline(llm, sink.clone());

        let (tx, _rx) = mpsc::unbounded_channel();
        let error = pipeline
            .run(chapter(), RestructureOptions::default(), tx)
            .await
            .unwrap_err();

        match error {
            PipelineError::PatchDroppedContent { missing_headings } => {
                assert!(missing_headings.contains(&"## Overview".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(sink.saved().is_empty());
    }

    #[tokio::test]
    async fn test_deadline_guard_force_fails_the_run() {
        let llm = Arc::new(
            MockLlm::new()
                .with_delay(Duration::from_millis(100))
                .with_response(EXTRACT, "- [ ] WES sign")
                .with_response(RESTRUCTURE, RESTRUCTURED)
                .with_response(VERIFY, "ALL_FACTS_PRESENT"),
        );
        let sink = Arc::new(MemorySink::new());
        let config = PipelineConfig {
            overall_deadline: Duration::from_millis(20),
            ..fast_config()
        };
        let pipeline = Pipeline::new(llm, sink, config);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let error = pipeline
            .run(chapter(), RestructureOptions::default(), tx)
            .await
            .unwrap_err();

        assert!(matches!(error, PipelineError::DeadlineExceeded));
        let events = drain(&mut rx).await;
        match events.last() {
            Some(PipelineEvent::Failed { kind, .. }) => {
                assert_eq!(*kind, FailureKind::DeadlineExceeded)
            }
            other => panic!("expected Failed event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_concurrent_runs_keep_their_event_streams_apart() {
        let llm = Arc::new(
            MockLlm::new()
                .with_response(EXTRACT, "- [ ] WES sign")
                .with_response(RESTRUCTURE, RESTRUCTURED)
                .with_response(VERIFY, "ALL_FACTS_PRESENT"),
        );
        let sink = Arc::new(MemorySink::new());
        let pipeline = pipeline(llm, sink);

        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();

        let (a, b) = tokio::join!(
            pipeline.run(chapter(), RestructureOptions::default(), tx_a),
            pipeline.run(chapter(), RestructureOptions::default(), tx_b),
        );
        let a = a.unwrap();
        let b = b.unwrap();
        assert_ne!(a.run_id, b.run_id);

        let events_a = drain(&mut rx_a).await;
        let events_b = drain(&mut rx_b).await;
        assert!(events_a.iter().all(|e| e.run_id() == a.run_id));
        assert!(events_b.iter().all(|e| e.run_id() == b.run_id));
    }
}
