//! Generation clients.
//!
//! - [`client`]: the [`GenerationClient`] trait the budget manager sends through,
//!   plus [`RequestParams`].
//! - [`openrouter`]: [`OpenRouterClient`], an HTTP implementation over the
//!   OpenRouter chat completions API.
//! - [`streaming`]: SSE decoding for streamed responses.
//! - [`retry`]: failure classification (context overflow, transient,
//!   permanent) and exponential backoff.

pub mod client;
pub mod openrouter;
pub mod retry;
pub mod streaming;

pub use client::{DeltaSink, GenerationClient, GenerationFuture, RequestParams};
pub use openrouter::{ChatRequest, Message, MessageRole, OpenRouterClient};
pub use retry::{FailureKind, RetryConfig, classify_failure};
pub use streaming::{SseDecoder, StreamEvent};
