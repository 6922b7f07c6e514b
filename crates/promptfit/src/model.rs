//! Model window sizes.
//!
//! The budget needs the input window of the target model; the output window
//! is carried along so clients can cap `max_tokens`. [`known_model`] covers
//! common families by matching the name after the last `/`, so
//! `"anthropic/claude-sonnet-4"` and `"claude-sonnet-4"` resolve the same way.

use serde::{Deserialize, Serialize};

/// Default model for the bundled tools.
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub id: String,
    pub max_input_tokens: usize,
    pub max_output_tokens: usize,
}

impl ModelDescriptor {
    pub fn new(id: impl Into<String>, max_input_tokens: usize, max_output_tokens: usize) -> Self {
        Self {
            id: id.into(),
            max_input_tokens,
            max_output_tokens,
        }
    }

    /// Catalog entry for `id`, or a descriptor with `fallback_max_input`
    /// input tokens and a 4096-token output window.
    pub fn lookup_or(id: &str, fallback_max_input: usize) -> Self {
        known_model(id).unwrap_or_else(|| Self::new(id, fallback_max_input, 4_096))
    }
}

/// Window sizes for well-known model families. `None` for anything else.
pub fn known_model(id: &str) -> Option<ModelDescriptor> {
    let name = id.rsplit('/').next().unwrap_or(id).to_lowercase();

    // Approximate published limits; the budget only needs the order of magnitude
    // right and the reserve absorbs small differences.
    let (input, output) = if name.contains("opus") {
        (200_000, 32_000)
    } else if name.contains("sonnet") {
        (200_000, 64_000)
    } else if name.contains("haiku") {
        (200_000, 8_192)
    } else if name.contains("gpt-4.1") {
        (1_047_576, 32_768)
    } else if name.contains("4o-mini") || name.contains("gpt-4o") {
        (128_000, 16_384)
    } else if name.contains("gpt-4-turbo") {
        (128_000, 4_096)
    } else if name.starts_with("gpt-4") {
        (8_192, 4_096)
    } else if name.starts_with("gpt-3.5") {
        (16_385, 4_096)
    } else if name.starts_with("o1") || name.starts_with("o3") || name.starts_with("o4") {
        (200_000, 100_000)
    } else if name.contains("gemini") {
        (1_048_576, 8_192)
    } else if name.starts_with("glm") {
        (128_000, 16_384)
    } else {
        return None;
    };

    Some(ModelDescriptor::new(id, input, output))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_prefix_is_ignored() {
        let bare = known_model("gpt-4o").unwrap();
        let prefixed = known_model("openai/gpt-4o").unwrap();
        assert_eq!(bare.max_input_tokens, prefixed.max_input_tokens);
        assert_eq!(prefixed.id, "openai/gpt-4o");
    }

    #[test]
    fn families_are_distinguished() {
        assert_eq!(known_model("openai/gpt-4").unwrap().max_input_tokens, 8_192);
        assert_eq!(known_model("openai/gpt-4-turbo").unwrap().max_input_tokens, 128_000);
        assert_eq!(known_model("openai/gpt-4o-mini").unwrap().max_input_tokens, 128_000);
        assert_eq!(
            known_model("anthropic/claude-sonnet-4").unwrap().max_input_tokens,
            200_000
        );
        assert!(known_model("google/gemini-2.5-flash").unwrap().max_input_tokens > 1_000_000);
    }

    #[test]
    fn unknown_model_uses_fallback() {
        assert!(known_model("acme/homegrown-7b").is_none());
        let model = ModelDescriptor::lookup_or("acme/homegrown-7b", 32_000);
        assert_eq!(model.max_input_tokens, 32_000);
        assert_eq!(model.id, "acme/homegrown-7b");
    }

    #[test]
    fn default_model_is_cataloged() {
        assert!(known_model(DEFAULT_MODEL).is_some());
    }
}
