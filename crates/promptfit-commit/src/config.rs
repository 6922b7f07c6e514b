//! Settings for a commit message run.
//!
//! [`CommitConfig`] is read from an optional TOML file and then overridden by
//! command-line flags. Every field has a default:
//!
//! ```toml
//! model = "anthropic/claude-sonnet-4"
//! max_tokens = 400
//!
//! [budget]
//! reserve_tokens = 200
//!
//! [retry]
//! max_retries = 3
//! ```

use std::path::Path;

use promptfit::api::{RequestParams, RetryConfig};
use promptfit::{BudgetConfig, BudgetError, DEFAULT_MODEL, ModelDescriptor};
use serde::Deserialize;

/// Input window assumed for models missing from the catalog.
pub const DEFAULT_FALLBACK_MAX_INPUT: usize = 32_000;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CommitConfig {
    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,
    /// Input window for models the catalog does not know.
    pub fallback_max_input: usize,
    /// Maximum tokens in the generated message. Default: `400`.
    pub max_tokens: u32,
    /// Default: `0.3`.
    pub temperature: f32,
    /// Default: `true`.
    pub streaming: bool,
    pub budget: BudgetConfig,
    pub retry: RetryConfig,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            fallback_max_input: DEFAULT_FALLBACK_MAX_INPUT,
            max_tokens: 400,
            temperature: 0.3,
            streaming: true,
            budget: BudgetConfig::default(),
            retry: RetryConfig::with_retries(2),
        }
    }
}

impl CommitConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, BudgetError> {
        let config: Self =
            toml::from_str(text).map_err(|e| BudgetError::InvalidConfig(e.to_string()))?;
        config.budget.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BudgetError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            BudgetError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Catalog entry for the configured model, or a fallback descriptor.
    pub fn model_descriptor(&self) -> ModelDescriptor {
        ModelDescriptor::lookup_or(&self.model, self.fallback_max_input)
    }

    /// Request settings, with `max_tokens` capped at the model's output window.
    pub fn request_params(&self) -> RequestParams {
        let output_cap = u32::try_from(self.model_descriptor().max_output_tokens).unwrap_or(u32::MAX);
        RequestParams::default()
            .with_max_tokens(self.max_tokens.min(output_cap))
            .with_temperature(self.temperature)
            .with_streaming(self.streaming)
    }
}
