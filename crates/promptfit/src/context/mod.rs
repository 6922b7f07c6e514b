//! Context window budgeting: blocks, token accounting, truncation, filling,
//! reduction, and assembly.
//!
//! The pieces compose leaf-first:
//!
//! 1. **[`tokens`]**: [`TokenAccountant`] counts, encodes and decodes for one
//!    model; [`TokenizerCache`] shares encoders between managers.
//!
//! 2. **[`truncate`](mod@truncate)**: shortens a block to a token ceiling with its
//!    [`TruncationStrategy`]. Diffs are cut at per-file hunk boundaries.
//!
//! 3. **[`fill`]**: [`BlockFiller`] spends the budget on forced blocks first,
//!    then on ordinary blocks in priority order.
//!
//! 4. **[`reduce`]**: [`SmartReducer`] shrinks or drops the least important
//!    ordinary block after the model rejects a prompt as too large.
//!
//! 5. **[`assemble`](mod@assemble)**: renders the included blocks as tagged
//!    sections in the [`BlockPolicy`]'s canonical order.
//!
//! [`ContextWindowManager`] ties these together and reports its decisions
//! through [`BudgetObserver`].

pub mod assemble;
pub mod block;
pub mod fill;
pub mod manager;
pub mod policy;
pub mod reduce;
pub mod report;
pub mod tokens;
pub mod truncate;

pub use assemble::assemble;
pub use block::{ContextBlock, TruncationStrategy};
pub use fill::{BlockFiller, FillOutcome, IncludedBlock};
pub use manager::{BudgetState, ContextWindowManager, PromptMessages};
pub use policy::BlockPolicy;
pub use reduce::{Reduction, ReductionAction, SmartReducer};
pub use report::{
    BudgetEvent, BudgetObserver, FillReport, FnObserver, LoggingObserver, NoopObserver,
    RecordingObserver,
};
pub use tokens::{BpeTokenizer, CharTokenizer, TokenAccountant, Tokenizer, TokenizerCache};
pub use truncate::truncate;
