//! Server-Sent Events decoding for streamed chat completions.
//!
//! [`SseDecoder`] turns raw body chunks into [`StreamEvent`]s. Lines are split
//! on raw bytes before UTF-8 decoding, so a character spanning two network
//! chunks decodes intact.

use super::openrouter::{ChatRequest, OPENROUTER_URL, OpenRouterClient, UsageInfo};
use serde::Deserialize;
use tracing::{debug, trace, warn};

/// One decoded stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    TextDelta(String),
    Usage(UsageInfo),
    /// An error object delivered inside the stream.
    Error(String),
    Done,
}

#[derive(Deserialize, Debug)]
struct StreamChunk {
    choices: Option<Vec<StreamChoice>>,
    usage: Option<UsageInfo>,
    error: Option<StreamError>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    delta: Option<StreamDelta>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct StreamError {
    message: String,
}

/// Incremental SSE line decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once `data: [DONE]` has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one body chunk; returns the events completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while !self.done {
            let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') else {
                break;
            };
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            self.decode_line(&line, &mut events);
        }
        events
    }

    /// Flush a trailing line without a newline and close the stream.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if !self.done {
            let rest = std::mem::take(&mut self.buffer);
            self.decode_line(&rest, &mut events);
        }
        if !self.done {
            self.done = true;
            events.push(StreamEvent::Done);
        }
        events
    }

    fn decode_line(&mut self, raw: &[u8], events: &mut Vec<StreamEvent>) {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim();
        if line.is_empty() || line.starts_with(':') {
            return;
        }
        if line == "data: [DONE]" {
            self.done = true;
            events.push(StreamEvent::Done);
            return;
        }
        if let Some(data) = line.strip_prefix("data: ") {
            parse_sse_data(data, events);
        }
    }
}

/// Parse one `data:` payload.
fn parse_sse_data(data: &str, events: &mut Vec<StreamEvent>) {
    let chunk = match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!("Failed to parse SSE chunk: {e} (data: {data})");
            return;
        }
    };

    if let Some(error) = chunk.error {
        events.push(StreamEvent::Error(error.message));
    }
    if let Some(usage) = chunk.usage {
        events.push(StreamEvent::Usage(usage));
    }
    for choice in chunk.choices.unwrap_or_default() {
        if let Some(content) = choice.delta.and_then(|d| d.content)
            && !content.is_empty()
        {
            events.push(StreamEvent::TextDelta(content));
        }
        if let Some(reason) = choice.finish_reason {
            trace!("Stream finish_reason: {reason}");
        }
    }
}

/// Concatenate the text deltas of `events`.
pub fn collect_text(events: &[StreamEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::TextDelta(delta) => Some(delta.as_str()),
            _ => None,
        })
        .collect()
}

impl OpenRouterClient {
    /// Send `body` with `stream: true`, calling `on_delta` for each text delta
    /// as it arrives. Returns the full text.
    pub async fn chat_stream_live(
        &self,
        body: &ChatRequest,
        mut on_delta: impl FnMut(&str),
    ) -> Result<String, String> {
        let mut stream_body =
            serde_json::to_value(body).map_err(|e| format!("failed to serialize request: {e}"))?;
        stream_body["stream"] = serde_json::Value::Bool(true);

        debug!("Sending streaming chat request: model={}", body.model);

        let mut resp = self
            .client
            .post(OPENROUTER_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(&stream_body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(format!("OpenRouter API HTTP {status}: {text}"));
        }

        let mut decoder = SseDecoder::new();
        let mut text = String::new();
        let mut handle = |events: Vec<StreamEvent>, text: &mut String| -> Result<(), String> {
            for event in events {
                match event {
                    StreamEvent::TextDelta(delta) => {
                        on_delta(&delta);
                        text.push_str(&delta);
                    }
                    StreamEvent::Usage(usage) => debug!(
                        "Token usage: prompt={}, completion={}",
                        usage.prompt_tokens.unwrap_or(0),
                        usage.completion_tokens.unwrap_or(0),
                    ),
                    StreamEvent::Error(message) => {
                        return Err(format!("OpenRouter API error: {message}"));
                    }
                    StreamEvent::Done => {}
                }
            }
            Ok(())
        };

        while !decoder.is_done()
            && let Some(chunk) = resp
                .chunk()
                .await
                .map_err(|e| format!("failed to read streaming chunk: {e}"))?
        {
            handle(decoder.push(&chunk), &mut text)?;
        }
        handle(decoder.finish(), &mut text)?;

        debug!("Stream completed: {} chars", text.len());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": text}}]})
        )
    }

    #[test]
    fn decodes_deltas_across_chunks() {
        let mut decoder = SseDecoder::new();
        let body = format!("{}{}data: [DONE]\n", delta("Hello "), delta("world"));
        let (a, b) = body.as_bytes().split_at(10);

        let mut events = decoder.push(a);
        events.extend(decoder.push(b));
        assert_eq!(collect_text(&events), "Hello world");
        assert_eq!(events.last(), Some(&StreamEvent::Done));
        assert!(decoder.is_done());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn multibyte_character_split_between_chunks() {
        let mut decoder = SseDecoder::new();
        let body = delta("naïve");
        let bytes = body.as_bytes();
        let split = body.find('ï').unwrap() + 1;

        let mut events = decoder.push(&bytes[..split]);
        events.extend(decoder.push(&bytes[split..]));
        assert_eq!(collect_text(&events), "naïve");
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": OPENROUTER PROCESSING\n\n");
        assert!(events.is_empty());
    }

    #[test]
    fn stream_error_object_is_surfaced() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: {\"error\": {\"message\": \"context length exceeded\"}}\n");
        assert_eq!(
            events,
            vec![StreamEvent::Error("context length exceeded".into())]
        );
    }

    #[test]
    fn unterminated_final_line_is_flushed() {
        let mut decoder = SseDecoder::new();
        let body = delta("tail");
        let events = decoder.push(body.trim_end().as_bytes());
        assert!(events.is_empty());

        let events = decoder.finish();
        assert_eq!(collect_text(&events), "tail");
        assert_eq!(events.last(), Some(&StreamEvent::Done));
    }

    #[test]
    fn usage_chunk() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(
            b"data: {\"choices\": [], \"usage\": {\"prompt_tokens\": 10, \"completion_tokens\": 3, \"total_tokens\": 13}}\n",
        );
        assert!(matches!(
            &events[..],
            [StreamEvent::Usage(UsageInfo {
                prompt_tokens: Some(10),
                ..
            })]
        ));
    }
}
