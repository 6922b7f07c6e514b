//! OpenRouter chat completions client.
//!
//! [`OpenRouterClient`] implements [`GenerationClient`]: transient failures are
//! retried with backoff inside the client, and provider responses that reject
//! the prompt as too long surface as [`GenerationError::ContextTooLarge`] for
//! the budget manager to handle.

use super::client::{DeltaSink, GenerationClient, GenerationFuture, RequestParams};
use super::retry::{FailureKind, RetryConfig, classify_failure};
use crate::context::PromptMessages;
use crate::error::GenerationError;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

// ── Request types ──────────────────────────────────────────────────

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Chat completion request body.
#[derive(Serialize, Debug, Default)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "is_zero_f32")]
    pub temperature: f32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

impl ChatRequest {
    /// Request for an assembled prompt. An empty system prompt is omitted.
    pub fn for_prompt(model: &str, prompt: &PromptMessages, params: &RequestParams) -> Self {
        let mut messages = Vec::with_capacity(2);
        if !prompt.system_prompt.is_empty() {
            messages.push(Message::system(&prompt.system_prompt));
        }
        messages.push(Message::user(&prompt.user_content));
        Self {
            model: model.to_string(),
            messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            stream: params.stream,
        }
    }
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

fn is_zero_f32(v: &f32) -> bool {
    *v == 0.0
}

// ── Response types ─────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    usage: Option<UsageInfo>,
    error: Option<ApiErrorResponse>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

/// Result of a non-streaming [`OpenRouterClient::chat`] call.
#[derive(Debug)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub usage: Option<UsageInfo>,
    pub finish_reason: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for the OpenRouter chat completions API.
pub struct OpenRouterClient {
    pub(crate) client: reqwest::Client,
    pub(crate) api_key: String,
    pub(crate) referer: String,
    pub(crate) title: String,
    retry: RetryConfig,
}

impl OpenRouterClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, String> {
        Self::with_headers(api_key, "https://github.com/tacryt-socryp/promptfit", "promptfit")
    }

    /// Client with custom `HTTP-Referer` and `X-Title` headers.
    pub fn with_headers(
        api_key: impl Into<String>,
        referer: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("promptfit/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            referer: referer.into(),
            title: title.into(),
            retry: RetryConfig::default(),
        })
    }

    /// Retry transient failures according to `retry`.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Send a non-streaming chat completion request.
    pub async fn chat(&self, body: &ChatRequest) -> Result<ChatCompletion, String> {
        debug!(
            "LLM request: model={}, messages={}, max_tokens={}, temp={}",
            body.model,
            body.messages.len(),
            body.max_tokens,
            body.temperature,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();
        let resp = self
            .client
            .post(OPENROUTER_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| format!("failed to read response: {e}"))?;
        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(format!("OpenRouter API HTTP {status}: {text}"));
        }
        parse_completion(&text)
    }

    async fn attempt(
        &self,
        body: &ChatRequest,
        on_delta: &mut (dyn FnMut(&str) + Send),
        emitted: &mut bool,
    ) -> Result<String, String> {
        if body.stream {
            return self
                .chat_stream_live(body, |delta| {
                    *emitted = true;
                    on_delta(delta);
                })
                .await;
        }
        let text = self
            .chat(body)
            .await?
            .content
            .ok_or_else(|| "empty response".to_string())?;
        *emitted = true;
        on_delta(&text);
        Ok(text)
    }
}

impl GenerationClient for OpenRouterClient {
    fn generate<'a>(
        &'a self,
        model: &'a str,
        messages: &'a PromptMessages,
        params: &'a RequestParams,
        on_delta: DeltaSink<'a>,
    ) -> GenerationFuture<'a> {
        Box::pin(async move {
            let body = ChatRequest::for_prompt(model, messages, params);
            let mut retry = 0;
            loop {
                let mut emitted = false;
                match self.attempt(&body, &mut *on_delta, &mut emitted).await {
                    Ok(text) => return Ok(text),
                    // Text already handed to the caller cannot be taken back.
                    Err(e) if !emitted && self.retry.should_retry(retry, &e) => {
                        let delay = self.retry.delay_for_attempt(retry);
                        warn!(
                            "Transient API error (retry {}/{}): {e}. Retrying in {delay:?}...",
                            retry + 1,
                            self.retry.max_retries,
                        );
                        tokio::time::sleep(delay).await;
                        retry += 1;
                    }
                    Err(e) => return Err(to_generation_error(e)),
                }
            }
        })
    }
}

/// Map a client error string onto the typed error the budget manager acts on.
pub fn to_generation_error(error: String) -> GenerationError {
    match classify_failure(&error) {
        FailureKind::ContextTooLarge => GenerationError::ContextTooLarge(error),
        FailureKind::Transient | FailureKind::Permanent => GenerationError::Failed(error),
    }
}

fn parse_completion(text: &str) -> Result<ChatCompletion, String> {
    let parsed: RawChatResponse =
        serde_json::from_str(text).map_err(|e| format!("failed to parse response: {e}"))?;

    if let Some(err) = parsed.error {
        return Err(format!("OpenRouter API error: {}", err.message));
    }
    if let Some(ref usage) = parsed.usage {
        debug!(
            "Token usage: prompt={}, completion={}, total={}",
            usage.prompt_tokens.unwrap_or(0),
            usage.completion_tokens.unwrap_or(0),
            usage.total_tokens.unwrap_or(0),
        );
    }

    let choice = parsed.choices.and_then(|c| c.into_iter().next());
    Ok(match choice {
        Some(c) => ChatCompletion {
            content: c.message.content,
            usage: parsed.usage,
            finish_reason: c.finish_reason,
        },
        None => ChatCompletion {
            content: None,
            usage: parsed.usage,
            finish_reason: None,
        },
    })
}
