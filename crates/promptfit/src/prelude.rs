//! Convenience re-exports for common `promptfit` types.
//!
//! ```
//! use promptfit::prelude::*;
//! ```
//!
//! Covers building a manager, adding blocks, observing it, and sending through
//! a client. Lower-level pieces (the filler, reducer, SSE decoder) stay in
//! their modules.

// ── Budget ──────────────────────────────────────────────────────────
pub use crate::config::BudgetConfig;
pub use crate::error::{BudgetError, GenerationError};
pub use crate::model::{ModelDescriptor, known_model};

// ── Context ─────────────────────────────────────────────────────────
pub use crate::context::{
    BlockPolicy, BudgetEvent, BudgetObserver, BudgetState, ContextBlock, ContextWindowManager,
    FillReport, FnObserver, LoggingObserver, NoopObserver, PromptMessages, RecordingObserver,
    TokenizerCache, TruncationStrategy,
};

// ── Clients ─────────────────────────────────────────────────────────
pub use crate::api::{GenerationClient, OpenRouterClient, RequestParams, RetryConfig};
