//! Error types for budget management and generation.

use thiserror::Error;

/// Failures surfaced by the [`ContextWindowManager`](crate::context::ContextWindowManager).
#[derive(Debug, Error)]
pub enum BudgetError {
    /// The system prompt and reserve already exceed the model's input window.
    #[error(
        "model {model} has no room for content: {max_input_tokens} input tokens \
         minus {system_prompt_tokens} system prompt tokens minus {reserve_tokens} reserve"
    )]
    BudgetUnderflow {
        model: String,
        max_input_tokens: usize,
        system_prompt_tokens: usize,
        reserve_tokens: usize,
    },

    /// A block with this name is already held by the manager.
    #[error("duplicate context block name: {0}")]
    DuplicateBlock(String),

    /// The block name is not part of the canonical order.
    #[error("context block {0} is not in the canonical order")]
    UnknownBlock(String),

    /// Every reducible block has been reduced and the request is still too large.
    #[error(
        "request is too large for model {model} after {attempts} attempt(s); \
         switch to a model with a larger context window"
    )]
    RequestTooLarge { model: String, attempts: u32 },

    /// The caller cancelled the generation.
    #[error("generation cancelled")]
    Cancelled,

    /// The generation client failed for a reason other than context size.
    #[error("generation failed: {0}")]
    Generation(String),

    /// `build_with_retry` was called on a manager that already finished.
    #[error("context window manager already finished ({0})")]
    AlreadyFinished(&'static str),

    /// A configuration value is out of range.
    #[error("invalid budget config: {0}")]
    InvalidConfig(String),
}

/// Failures reported by a [`GenerationClient`](crate::api::GenerationClient).
///
/// The manager's retry decision matches on this enum; only
/// [`ContextTooLarge`](GenerationError::ContextTooLarge) leads to a reduction pass.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("context too large: {0}")]
    ContextTooLarge(String),
    #[error("cancelled")]
    Cancelled,
    #[error("{0}")]
    Failed(String),
}

/// Tokenizer construction or decoding failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenizerError {
    #[error("no encoder available for model {model}: {reason}")]
    Unavailable { model: String, reason: String },
    #[error("token sequence does not decode to valid text: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_too_large_is_actionable() {
        let err = BudgetError::RequestTooLarge {
            model: "gpt-4o".into(),
            attempts: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("gpt-4o"));
        assert!(msg.contains("larger context window"));
    }

    #[test]
    fn underflow_names_all_terms() {
        let err = BudgetError::BudgetUnderflow {
            model: "tiny".into(),
            max_input_tokens: 100,
            system_prompt_tokens: 80,
            reserve_tokens: 100,
        };
        let msg = err.to_string();
        assert!(msg.contains("100 input tokens"));
        assert!(msg.contains("80 system prompt tokens"));
    }
}
