//! Commit message generation on top of promptfit.
//!
//! `promptfit-commit` turns an existing diff, optional history and custom
//! instructions into the standard block set, fits it into the model's window
//! with a [`ContextWindowManager`](promptfit::context::ContextWindowManager),
//! and streams a commit message back. It never runs git itself.
//!
//! # Library usage
//!
//! ```
//! use promptfit::context::{ContextWindowManager, TokenizerCache};
//! use promptfit_commit::{CommitConfig, CommitInputs, commit_system_prompt};
//!
//! let config = CommitConfig::default();
//! let cache = TokenizerCache::new();
//! let mut manager = ContextWindowManager::new(
//!     config.model_descriptor(),
//!     commit_system_prompt(),
//!     &cache,
//!     config.budget.clone(),
//! )
//! .unwrap();
//! CommitInputs::new("diff --git a/README b/README\n+hello\n")
//!     .add_to(&mut manager)
//!     .unwrap();
//!
//! let messages = manager.build_messages();
//! assert!(messages.user_content.contains("<code-changes>"));
//! ```
//!
//! # Binary
//!
//! ```sh
//! git diff --cached | promptfit-commit --history <(git log -20 --format=%s)
//! promptfit-commit changes.diff --dry-run
//! ```

pub mod blocks;
pub mod config;
pub mod prompt;

pub use blocks::CommitInputs;
pub use config::CommitConfig;
pub use prompt::{DEFAULT_REMINDER, commit_system_prompt, render_dry_run};
