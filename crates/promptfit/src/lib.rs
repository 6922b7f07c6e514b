//! Fit prompt context into a model's input window.
//!
//! `promptfit` assembles the user message for a generative model out of named,
//! prioritized [`ContextBlock`](context::ContextBlock)s (a diff, commit history,
//! custom instructions, a reminder) and guarantees the result stays within the
//! model's input token budget while keeping the blocks that matter most.
//!
//! The core abstraction is the
//! [`ContextWindowManager`](context::ContextWindowManager): it owns the model
//! descriptor, the system prompt and the block set, computes the budget, fills
//! it greedily, and retries with progressively reduced content when the model
//! still rejects the prompt as too large.
//!
//! # Getting started
//!
//! ```ignore
//! use promptfit::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api_key = std::env::var("OPENROUTER_KEY")?;
//!     let client = OpenRouterClient::new(api_key)?.with_retry(RetryConfig::with_retries(2));
//!
//!     let cache = TokenizerCache::new();
//!     let model = ModelDescriptor::lookup_or("openai/gpt-4o-mini", 128_000);
//!     let mut manager = ContextWindowManager::new(
//!         model,
//!         "Write a conventional commit message for the changes.",
//!         &cache,
//!         BudgetConfig::default(),
//!     )?
//!     .with_observer(std::sync::Arc::new(LoggingObserver));
//!
//!     manager.add_block(ContextBlock::diff("code-changes", 100, std::fs::read_to_string("changes.diff")?));
//!     manager.add_block(ContextBlock::tail_cut("reminder", 90, "Use the imperative mood."));
//!     manager.add_block(ContextBlock::head_cut("recent-commits", 10, "fix: handle empty input\n"));
//!
//!     let message = manager
//!         .build_with_retry(&client, &RequestParams::default(), &CancellationToken::new(), |d| {
//!             print!("{d}")
//!         })
//!         .await?;
//!     println!("\n{} chars", message.len());
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Blocks and retention rules:** [`context::block`] and [`context::policy`].
//!   Larger priorities are more important. Blocks named in the policy's forced
//!   set are truncated as a last resort but never dropped.
//!
//! - **Token counting:** [`context::tokens`]. Share one
//!   [`TokenizerCache`](context::TokenizerCache) per process.
//!
//! - **Truncation strategies:** [`context::truncate`](mod@context::truncate),
//!   including hunk-aware diff cutting.
//!
//! - **Observing decisions:** implement [`BudgetObserver`](context::BudgetObserver),
//!   or use [`LoggingObserver`](context::LoggingObserver) /
//!   [`RecordingObserver`](context::RecordingObserver).
//!
//! - **Sending:** implement [`GenerationClient`](api::GenerationClient) or use
//!   [`OpenRouterClient`](api::OpenRouterClient).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`context`] | Blocks, token accounting, truncation, fill, reduction, assembly, the manager |
//! | [`api`] | Generation client trait, OpenRouter client, SSE streaming, retry |
//! | [`config`] | [`BudgetConfig`]: reserve, truncation floor, reduction ratio, block policy |
//! | [`model`] | [`ModelDescriptor`] and the window-size catalog |
//! | [`error`] | [`BudgetError`], [`GenerationError`], [`TokenizerError`] |

pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod model;
pub mod prelude;

pub use config::BudgetConfig;
pub use error::{BudgetError, GenerationError, TokenizerError};
pub use model::{DEFAULT_MODEL, ModelDescriptor, known_model};
