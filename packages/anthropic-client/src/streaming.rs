//! SSE streaming parser for Messages API responses.
//!
//! Converts a raw `reqwest` byte stream into `MessageDelta` values.
//! Handles `event:`/`data:` framing, partial lines, and buffering.

use bytes::Bytes;
use futures::stream::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::LlmError;

/// A single text delta from a streaming message.
#[derive(Debug, Clone)]
pub struct MessageDelta {
    /// The text delta for this chunk (empty for the terminal chunk).
    pub delta: String,
    /// Whether the stream is done.
    pub done: bool,
}

/// Raw streaming event from the Messages API. The `type` field selects
/// which of the optional payloads is present.
#[derive(Debug, serde::Deserialize)]
struct StreamEventRaw {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    delta: Option<DeltaRaw>,
    #[serde(default)]
    error: Option<StreamErrorRaw>,
}

#[derive(Debug, serde::Deserialize)]
struct DeltaRaw {
    #[serde(rename = "type")]
    #[serde(default)]
    delta_type: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct StreamErrorRaw {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

/// Stream adapter that converts raw SSE bytes into `MessageDelta` values.
pub struct MessageStream {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    buffer: String,
}

impl MessageStream {
    pub(crate) fn new(
        byte_stream: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    ) -> Self {
        Self {
            inner: Box::pin(byte_stream),
            buffer: String::new(),
        }
    }
}

impl Stream for MessageStream {
    type Item = Result<MessageDelta, LlmError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            // Try to parse a complete line from the buffer
            if let Some(chunk) = try_parse_line(&mut this.buffer) {
                return Poll::Ready(Some(chunk));
            }

            // Need more data from the byte stream
            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    match std::str::from_utf8(&bytes) {
                        Ok(text) => this.buffer.push_str(text),
                        Err(e) => {
                            return Poll::Ready(Some(Err(LlmError::Parse(format!(
                                "Invalid UTF-8 in stream: {}",
                                e
                            )))));
                        }
                    }
                    // Loop to try parsing again
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(LlmError::Network(e.to_string()))));
                }
                Poll::Ready(None) => {
                    // Stream ended — check for remaining buffer content
                    if this.buffer.trim().is_empty() {
                        return Poll::Ready(None);
                    }
                    if let Some(chunk) = try_parse_line(&mut this.buffer) {
                        return Poll::Ready(Some(chunk));
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Try to extract and parse a complete SSE line from the buffer.
/// Returns `None` if no complete line is available yet.
fn try_parse_line(buffer: &mut String) -> Option<Result<MessageDelta, LlmError>> {
    loop {
        let newline_pos = buffer.find('\n')?;
        let line = buffer[..newline_pos].trim().to_string();
        buffer.drain(..=newline_pos);

        // Skip empty lines (SSE uses blank lines as event separators)
        // and `event:` lines — the JSON payload repeats the event type.
        if line.is_empty() || line.starts_with("event:") {
            continue;
        }

        if let Some(data) = line.strip_prefix("data: ") {
            let data = data.trim();

            let raw: StreamEventRaw = match serde_json::from_str(data) {
                Ok(raw) => raw,
                Err(e) => {
                    return Some(Err(LlmError::Parse(format!(
                        "Failed to parse stream event: {} (data: {})",
                        e,
                        &data[..data.len().min(200)]
                    ))));
                }
            };

            match raw.event_type.as_str() {
                "content_block_delta" => {
                    let delta = raw
                        .delta
                        .filter(|d| d.delta_type.as_deref() == Some("text_delta"))
                        .and_then(|d| d.text)
                        .unwrap_or_default();

                    return Some(Ok(MessageDelta { delta, done: false }));
                }
                "message_stop" => {
                    return Some(Ok(MessageDelta {
                        delta: String::new(),
                        done: true,
                    }));
                }
                "error" => {
                    let (status, message) = match raw.error {
                        Some(e) => {
                            let status = match e.error_type.as_str() {
                                "rate_limit_error" => 429,
                                "overloaded_error" => 529,
                                _ => 500,
                            };
                            (status, e.message)
                        }
                        None => (500, "unknown stream error".to_string()),
                    };
                    return Some(Err(LlmError::Api { status, message }));
                }
                // message_start, content_block_start, content_block_stop,
                // message_delta, ping — nothing to surface.
                _ => continue,
            }
        }

        // Skip non-data lines (e.g., "id:", "retry:", comments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn make_sse_bytes(lines: &[&str]) -> Vec<Result<Bytes, reqwest::Error>> {
        lines
            .iter()
            .map(|line| Ok(Bytes::from(format!("{}\n", line))))
            .collect()
    }

    #[tokio::test]
    async fn test_parse_single_delta() {
        let data = make_sse_bytes(&[
            "event: content_block_delta",
            r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hello"}}"#,
            "",
            "event: message_stop",
            r#"data: {"type":"message_stop"}"#,
        ]);

        let mut stream = MessageStream::new(futures::stream::iter(data));

        let chunk = stream.next().await.unwrap().unwrap();
        assert_eq!(chunk.delta, "Hello");
        assert!(!chunk.done);

        let done = stream.next().await.unwrap().unwrap();
        assert!(done.done);
    }

    #[tokio::test]
    async fn test_parse_multiple_deltas_skips_bookkeeping_events() {
        let data = make_sse_bytes(&[
            "event: message_start",
            r#"data: {"type":"message_start","message":{"id":"msg_1"}}"#,
            "",
            "event: content_block_start",
            r#"data: {"type":"content_block_start","index":0}"#,
            "",
            r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hello"}}"#,
            "",
            r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":" world"}}"#,
            "",
            r#"data: {"type":"ping"}"#,
            "",
            r#"data: {"type":"message_stop"}"#,
        ]);

        let mut stream = MessageStream::new(futures::stream::iter(data));

        let c1 = stream.next().await.unwrap().unwrap();
        assert_eq!(c1.delta, "Hello");

        let c2 = stream.next().await.unwrap().unwrap();
        assert_eq!(c2.delta, " world");

        let done = stream.next().await.unwrap().unwrap();
        assert!(done.done);
    }

    #[tokio::test]
    async fn test_delta_split_across_chunk_boundary() {
        let payload =
            r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"split"}}"#;
        let (a, b) = payload.split_at(40);
        let data: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from(a.to_string())),
            Ok(Bytes::from(format!("{}\n", b))),
        ];

        let mut stream = MessageStream::new(futures::stream::iter(data));

        let chunk = stream.next().await.unwrap().unwrap();
        assert_eq!(chunk.delta, "split");
    }

    #[tokio::test]
    async fn test_stream_error_event_maps_status() {
        let data = make_sse_bytes(&[
            r#"data: {"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        ]);

        let mut stream = MessageStream::new(futures::stream::iter(data));

        let err = stream.next().await.unwrap().unwrap_err();
        assert!(err.is_transient());
        match err {
            LlmError::Api { status, .. } => assert_eq!(status, 529),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
