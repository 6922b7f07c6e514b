//! The generation seam used by the budget manager.
//!
//! [`GenerationClient`] is object-safe: implementations return a boxed future
//! so the manager can hold `&dyn GenerationClient` and tests can script
//! responses without an HTTP stack.

use crate::context::PromptMessages;
use crate::error::GenerationError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by [`GenerationClient::generate`].
pub type GenerationFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>>;

/// Callback receiving streamed text deltas.
pub type DeltaSink<'a> = &'a mut (dyn FnMut(&str) + Send);

/// Per-request generation settings.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RequestParams {
    pub max_tokens: u32,
    pub temperature: f32,
    /// Deliver the response incrementally through the delta callback.
    pub stream: bool,
}

impl Default for RequestParams {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.3,
            stream: true,
        }
    }
}

impl RequestParams {
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// A text generation backend.
///
/// Implementations must report a prompt that exceeds the model window as
/// [`GenerationError::ContextTooLarge`]; that is the only error the manager
/// answers with a reduction pass. Non-streaming implementations may ignore
/// `on_delta` and return the full text.
pub trait GenerationClient: Send + Sync {
    fn generate<'a>(
        &'a self,
        model: &'a str,
        messages: &'a PromptMessages,
        params: &'a RequestParams,
        on_delta: DeltaSink<'a>,
    ) -> GenerationFuture<'a>;
}

impl<T: GenerationClient + ?Sized> GenerationClient for &T {
    fn generate<'a>(
        &'a self,
        model: &'a str,
        messages: &'a PromptMessages,
        params: &'a RequestParams,
        on_delta: DeltaSink<'a>,
    ) -> GenerationFuture<'a> {
        (**self).generate(model, messages, params, on_delta)
    }
}
