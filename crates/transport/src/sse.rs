//! Server-Sent-Events reader for streaming model responses.
//!
//! The upstream servers emit several generations of streaming event shapes;
//! the union here recognizes all of them and ignores the rest, so a server
//! upgrade cannot break the reader.

use std::pin::Pin;

use futures::{Stream, StreamExt};
use serde_json::Value;

use crate::error::TransportError;

/// One event surfaced to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A chunk of answer text.
    ContentDelta(String),
    /// A chunk of reasoning summary (thinking models).
    ReasoningDelta(String),
    /// The server-assigned response id, used for conversation chaining.
    ResponseId(String),
    /// `data: [DONE]` terminator.
    Done,
    /// Anything unrecognized; safe to skip.
    Ignored,
}

/// Classify a parsed `data:` JSON chunk.
pub fn classify_chunk(chunk: &Value) -> StreamEvent {
    let chunk_type = chunk.get("type").and_then(Value::as_str).unwrap_or("");

    match chunk_type {
        "response.output_text.delta" => {
            content_event(chunk.get("delta").and_then(Value::as_str).unwrap_or(""))
        }
        "response.content_part.delta" | "content.delta" => {
            let delta = chunk.get("delta");
            let text = delta
                .and_then(|d| d.get("text"))
                .and_then(Value::as_str)
                .or_else(|| delta.and_then(Value::as_str))
                .unwrap_or("");
            content_event(text)
        }
        "response.text.delta" => {
            let text = chunk
                .get("delta")
                .and_then(Value::as_str)
                .or_else(|| chunk.get("text").and_then(Value::as_str))
                .unwrap_or("");
            content_event(text)
        }
        "response.reasoning_summary_text.delta" => {
            reasoning_event(chunk.get("delta").and_then(Value::as_str).unwrap_or(""))
        }
        "response.reasoning_summary_text.done" => {
            reasoning_event(chunk.get("text").and_then(Value::as_str).unwrap_or(""))
        }
        "response.created" | "response.completed" | "response.done" => {
            let id = chunk
                .get("response")
                .and_then(|r| r.get("id"))
                .and_then(Value::as_str)
                .or_else(|| chunk.get("id").and_then(Value::as_str))
                .unwrap_or("");
            if id.is_empty() {
                StreamEvent::Ignored
            } else {
                StreamEvent::ResponseId(id.to_string())
            }
        }
        _ => {
            // Legacy chat-completions stream: choices[0].delta.content
            if let Some(text) = chunk
                .get("choices")
                .and_then(|c| c.get(0))
                .and_then(|c| c.get("delta"))
                .and_then(|d| d.get("content"))
                .and_then(Value::as_str)
            {
                return content_event(text);
            }
            StreamEvent::Ignored
        }
    }
}

fn content_event(text: &str) -> StreamEvent {
    if text.is_empty() {
        StreamEvent::Ignored
    } else {
        StreamEvent::ContentDelta(text.to_string())
    }
}

fn reasoning_event(text: &str) -> StreamEvent {
    if text.is_empty() {
        StreamEvent::Ignored
    } else {
        StreamEvent::ReasoningDelta(text.to_string())
    }
}

/// Parse one SSE line. `event:` lines and blanks yield nothing.
pub fn parse_line(line: &str) -> Option<StreamEvent> {
    let line = line.trim_end_matches('\r');
    if line.is_empty() || line.starts_with("event:") {
        return None;
    }
    let data = line.strip_prefix("data:")?.trim();
    if data == "[DONE]" {
        return Some(StreamEvent::Done);
    }
    match serde_json::from_str::<Value>(data) {
        Ok(chunk) => Some(classify_chunk(&chunk)),
        // Partial or malformed chunks are skipped, as the upstream tools do.
        Err(_) => None,
    }
}

/// Accumulates raw bytes and yields complete lines.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: String,
}

impl SseLineBuffer {
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));
    }

    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.buffer.find('\n')?;
        let line = self.buffer[..pos].to_string();
        self.buffer.drain(..=pos);
        Some(line)
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<bytes::Bytes>> + Send>>;

/// A live SSE response.
pub struct SseStream {
    stream: ByteStream,
    buffer: SseLineBuffer,
    finished: bool,
}

impl SseStream {
    pub fn new(response: reqwest::Response) -> Self {
        Self {
            stream: Box::pin(response.bytes_stream()),
            buffer: SseLineBuffer::default(),
            finished: false,
        }
    }

    /// Next recognized event; `None` once the stream is exhausted or the
    /// `[DONE]` sentinel arrived.
    pub async fn next_event(&mut self) -> Result<Option<StreamEvent>, TransportError> {
        if self.finished {
            return Ok(None);
        }
        loop {
            while let Some(line) = self.buffer.next_line() {
                match parse_line(&line) {
                    Some(StreamEvent::Done) => {
                        self.finished = true;
                        return Ok(None);
                    }
                    Some(StreamEvent::Ignored) | None => continue,
                    Some(event) => return Ok(Some(event)),
                }
            }
            match self.stream.next().await {
                Some(Ok(chunk)) => self.buffer.push(&chunk),
                Some(Err(err)) => {
                    self.finished = true;
                    return Err(TransportError::from(err));
                }
                None => {
                    self.finished = true;
                    return Ok(None);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_output_text_delta() {
        let chunk = json!({"type": "response.output_text.delta", "delta": "hel"});
        assert_eq!(classify_chunk(&chunk), StreamEvent::ContentDelta("hel".into()));
    }

    #[test]
    fn test_content_part_delta_object_and_string() {
        let obj = json!({"type": "response.content_part.delta", "delta": {"text": "a"}});
        assert_eq!(classify_chunk(&obj), StreamEvent::ContentDelta("a".into()));
        let s = json!({"type": "content.delta", "delta": "b"});
        assert_eq!(classify_chunk(&s), StreamEvent::ContentDelta("b".into()));
    }

    #[test]
    fn test_text_delta_variant() {
        let with_delta = json!({"type": "response.text.delta", "delta": "x"});
        assert_eq!(classify_chunk(&with_delta), StreamEvent::ContentDelta("x".into()));
        let with_text = json!({"type": "response.text.delta", "text": "y"});
        assert_eq!(classify_chunk(&with_text), StreamEvent::ContentDelta("y".into()));
    }

    #[test]
    fn test_reasoning_deltas() {
        let delta = json!({"type": "response.reasoning_summary_text.delta", "delta": "think"});
        assert_eq!(classify_chunk(&delta), StreamEvent::ReasoningDelta("think".into()));
        let done = json!({"type": "response.reasoning_summary_text.done", "text": "full"});
        assert_eq!(classify_chunk(&done), StreamEvent::ReasoningDelta("full".into()));
    }

    #[test]
    fn test_response_id_events() {
        let created = json!({"type": "response.created", "response": {"id": "resp_1"}});
        assert_eq!(classify_chunk(&created), StreamEvent::ResponseId("resp_1".into()));
        let flat = json!({"type": "response.completed", "id": "resp_2"});
        assert_eq!(classify_chunk(&flat), StreamEvent::ResponseId("resp_2".into()));
        let done = json!({"type": "response.done", "response": {"id": "resp_3"}});
        assert_eq!(classify_chunk(&done), StreamEvent::ResponseId("resp_3".into()));
    }

    #[test]
    fn test_chat_completions_delta() {
        let chunk = json!({"choices": [{"delta": {"content": "hi"}}]});
        assert_eq!(classify_chunk(&chunk), StreamEvent::ContentDelta("hi".into()));
    }

    #[test]
    fn test_unknown_types_ignored() {
        let chunk = json!({"type": "response.audio.delta", "delta": "zzz"});
        assert_eq!(classify_chunk(&chunk), StreamEvent::Ignored);
        let empty = json!({});
        assert_eq!(classify_chunk(&empty), StreamEvent::Ignored);
    }

    #[test]
    fn test_parse_line_handles_framing() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("event: message"), None);
        assert_eq!(parse_line("data: [DONE]"), Some(StreamEvent::Done));
        assert_eq!(parse_line("data: {broken"), None);
        assert_eq!(
            parse_line(r#"data: {"type": "response.output_text.delta", "delta": "ok"}"#),
            Some(StreamEvent::ContentDelta("ok".into()))
        );
    }

    #[test]
    fn test_line_buffer_reassembles_split_chunks() {
        let mut buf = SseLineBuffer::default();
        buf.push(b"data: {\"type\": \"respon");
        assert_eq!(buf.next_line(), None);
        buf.push(b"se.output_text.delta\", \"delta\": \"ab\"}\ndata: [DONE]\n");
        let line1 = buf.next_line().unwrap();
        assert_eq!(
            parse_line(&line1),
            Some(StreamEvent::ContentDelta("ab".into()))
        );
        assert_eq!(parse_line(&buf.next_line().unwrap()), Some(StreamEvent::Done));
        assert_eq!(buf.next_line(), None);
    }
}
