//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that drive the pipeline
//! without making real LLM or database calls.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use anthropic_client::LlmError;

use crate::llm::{Llm, LlmRequest};
use crate::pipeline::{ChapterSink, RestructuredGuide};

/// One scripted reply.
#[derive(Debug, Clone)]
enum MockReply {
    Text(String),
    ApiError { status: u16, message: String },
}

/// A mock LLM for testing.
///
/// Replies are scripted per prompt marker: the first script whose marker
/// substring appears in the request prompt answers the call. A marker's
/// replies are consumed in order; the last one is sticky so single-reply
/// scripts serve any number of calls. All prompts are recorded for
/// call-count assertions.
#[derive(Default)]
pub struct MockLlm {
    scripts: Mutex<Vec<(String, VecDeque<MockReply>)>>,
    calls: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl MockLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a text reply for prompts containing `marker`.
    pub fn with_response(self, marker: impl Into<String>, response: impl Into<String>) -> Self {
        self.push(marker.into(), MockReply::Text(response.into()));
        self
    }

    /// Queue an API error reply for prompts containing `marker`.
    pub fn with_api_error(
        self,
        marker: impl Into<String>,
        status: u16,
        message: impl Into<String>,
    ) -> Self {
        self.push(
            marker.into(),
            MockReply::ApiError {
                status,
                message: message.into(),
            },
        );
        self
    }

    /// Delay every call by `delay` (for deadline tests).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// All recorded prompts, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// How many recorded prompts contain `marker`.
    pub fn calls_matching(&self, marker: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|prompt| prompt.contains(marker))
            .count()
    }

    fn push(&self, marker: String, reply: MockReply) {
        let mut scripts = self.scripts.lock().unwrap();
        if let Some((_, queue)) = scripts.iter_mut().find(|(m, _)| *m == marker) {
            queue.push_back(reply);
        } else {
            scripts.push((marker, VecDeque::from([reply])));
        }
    }

    fn reply_for(&self, prompt: &str) -> Option<MockReply> {
        let mut scripts = self.scripts.lock().unwrap();
        for (marker, queue) in scripts.iter_mut() {
            if prompt.contains(marker.as_str()) {
                return if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                };
            }
        }
        None
    }
}

#[async_trait]
impl Llm for MockLlm {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.calls.lock().unwrap().push(request.prompt.clone());

        match self.reply_for(&request.prompt) {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::ApiError { status, message }) => {
                Err(LlmError::Api { status, message })
            }
            None => Err(LlmError::Parse(format!(
                "MockLlm has no scripted reply for prompt: {}",
                request.prompt.chars().take(80).collect::<String>()
            ))),
        }
    }
}

/// An in-memory `ChapterSink` recording everything it was asked to save.
#[derive(Default)]
pub struct MemorySink {
    saved: Arc<Mutex<Vec<(Uuid, RestructuredGuide)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Saved guides with the ids they were assigned.
    pub fn saved(&self) -> Vec<(Uuid, RestructuredGuide)> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChapterSink for MemorySink {
    async fn save_restructured(
        &self,
        guide: &RestructuredGuide,
    ) -> Result<Uuid, Box<dyn std::error::Error + Send + Sync>> {
        let id = Uuid::new_v4();
        self.saved.lock().unwrap().push((id, guide.clone()));
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_replies_in_order_then_sticky() {
        let llm = MockLlm::new()
            .with_response("verify", "first")
            .with_response("verify", "second");

        let request = |prompt: &str| LlmRequest::new("model", prompt, 64);

        assert_eq!(llm.complete(request("please verify this")).await.unwrap(), "first");
        assert_eq!(llm.complete(request("please verify this")).await.unwrap(), "second");
        // Last reply is sticky
        assert_eq!(llm.complete(request("please verify this")).await.unwrap(), "second");
        assert_eq!(llm.calls_matching("verify"), 3);
    }

    #[tokio::test]
    async fn test_mock_error_injection() {
        let llm = MockLlm::new()
            .with_api_error("flaky", 529, "overloaded")
            .with_response("flaky", "recovered");

        let request = LlmRequest::new("model", "a flaky call", 64);
        let error = llm.complete(request.clone()).await.unwrap_err();
        assert!(error.is_transient());

        assert_eq!(llm.complete(request).await.unwrap(), "recovered");
    }

    #[tokio::test]
    async fn test_unscripted_prompt_is_an_error() {
        let llm = MockLlm::new();
        let error = llm
            .complete(LlmRequest::new("model", "mystery prompt", 64))
            .await
            .unwrap_err();
        assert!(matches!(error, LlmError::Parse(_)));
    }

    #[tokio::test]
    async fn test_memory_sink_records_saves() {
        let sink = MemorySink::new();
        let guide = RestructuredGuide {
            original_id: Uuid::new_v4(),
            source: "core-radiology".into(),
            number: 1,
            title: "Chest".into(),
            study_guide: "## Overview".into(),
            language: None,
            prompt_hash: "abc".into(),
            facts_restored: 2,
        };

        let id = sink.save_restructured(&guide).await.unwrap();
        let saved = sink.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, id);
        assert_eq!(saved[0].1.facts_restored, 2);
    }
}
