//! The budget orchestrator.
//!
//! A [`ContextWindowManager`] owns the target model, the system prompt and the
//! block set for one generation. It computes the content budget, fills and
//! assembles the user message, and drives the reduce-and-retry loop when the
//! generation client still reports the prompt as too large.
//!
//! ```text
//! Building ──build_messages──▶ Filled
//!     │                          │
//!     └──────build_with_retry────┴──▶ Sending ──ok──▶ Succeeded
//!                                      │   ▲
//!                          too large   │   │ reduced
//!                                      ▼   │
//!                                     Reducing ──exhausted──▶ Failed
//! ```
//!
//! Cancellation and non-size client failures also end in `Failed`, without a
//! reduction pass.
//!
//! # Example
//!
//! ```
//! use promptfit::prelude::*;
//!
//! let cache = TokenizerCache::new();
//! let model = ModelDescriptor::new("openai/gpt-4o", 128_000, 16_384);
//! let mut manager = ContextWindowManager::new(
//!     model,
//!     "Write a commit message.",
//!     &cache,
//!     BudgetConfig::default(),
//! )
//! .unwrap();
//!
//! manager.add_block(ContextBlock::diff("code-changes", 100, "diff --git a/x b/x\n+1\n"));
//! manager.add_block(ContextBlock::tail_cut("reminder", 90, "Be concise."));
//!
//! let messages = manager.build_messages();
//! assert!(messages.user_content.starts_with("<code-changes>"));
//! ```

use super::assemble::assemble;
use super::block::ContextBlock;
use super::fill::{BlockFiller, FillOutcome};
use super::reduce::{ReductionAction, SmartReducer};
use super::report::{BudgetEvent, BudgetObserver, NoopObserver};
use super::tokens::{TokenAccountant, TokenizerCache};
use crate::api::client::{DeltaSink, GenerationClient, RequestParams};
use crate::config::BudgetConfig;
use crate::error::{BudgetError, GenerationError};
use crate::model::ModelDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The two messages sent to the model.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct PromptMessages {
    pub system_prompt: String,
    pub user_content: String,
}

/// Lifecycle of a [`ContextWindowManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetState {
    Building,
    Filled,
    Sending,
    Reducing,
    Succeeded,
    Failed,
}

impl BudgetState {
    pub fn is_terminal(self) -> bool {
        matches!(self, BudgetState::Succeeded | BudgetState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BudgetState::Building => "building",
            BudgetState::Filled => "filled",
            BudgetState::Sending => "sending",
            BudgetState::Reducing => "reducing",
            BudgetState::Succeeded => "succeeded",
            BudgetState::Failed => "failed",
        }
    }
}

impl fmt::Display for BudgetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fits prompt content into a model's input window.
///
/// One manager serves one generation, including its retries; create a new one
/// for the next request.
pub struct ContextWindowManager {
    model: ModelDescriptor,
    config: BudgetConfig,
    accountant: TokenAccountant,
    system_prompt: String,
    system_prompt_tokens: usize,
    available: usize,
    blocks: Vec<ContextBlock>,
    /// Token counts of each held block as it was added.
    original_tokens: HashMap<String, usize>,
    state: BudgetState,
    last_fill: Option<FillOutcome>,
    observer: Arc<dyn BudgetObserver>,
}

impl ContextWindowManager {
    /// Create a manager for `model`, taking its tokenizer from `cache`.
    ///
    /// Fails with [`BudgetError::BudgetUnderflow`] when the system prompt and
    /// reserve leave no room in the input window, and with
    /// [`BudgetError::InvalidConfig`] when `config` does not validate.
    pub fn new(
        model: ModelDescriptor,
        system_prompt: impl Into<String>,
        cache: &TokenizerCache,
        config: BudgetConfig,
    ) -> Result<Self, BudgetError> {
        config.validate()?;
        let accountant = cache.accountant(&model.id);
        if accountant.is_degraded() {
            warn!(
                "Token counts for {} are approximate ({})",
                model.id,
                accountant.encoding()
            );
        }

        let system_prompt = system_prompt.into();
        let system_prompt_tokens = accountant.count(&system_prompt);
        let available = content_budget(&model, system_prompt_tokens, config.reserve_tokens)?;
        debug!(
            "Budget for {}: {} input - {} system - {} reserve = {} tokens ({})",
            model.id,
            model.max_input_tokens,
            system_prompt_tokens,
            config.reserve_tokens,
            available,
            accountant.encoding()
        );

        Ok(Self {
            model,
            config,
            accountant,
            system_prompt,
            system_prompt_tokens,
            available,
            blocks: Vec::new(),
            original_tokens: HashMap::new(),
            state: BudgetState::Building,
            last_fill: None,
            observer: Arc::new(NoopObserver),
        })
    }

    /// Attach an observer for fill, reduction and attempt events.
    pub fn with_observer(mut self, observer: Arc<dyn BudgetObserver>) -> Self {
        if self.accountant.is_degraded() {
            observer.on_event(&BudgetEvent::TokenizerDegraded {
                model: &self.model.id,
                encoding: self.accountant.encoding(),
            });
        }
        self.observer = observer;
        self
    }

    // ── Accessors ──────────────────────────────────────────────────

    pub fn model(&self) -> &ModelDescriptor {
        &self.model
    }

    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }

    pub fn accountant(&self) -> &TokenAccountant {
        &self.accountant
    }

    pub fn state(&self) -> BudgetState {
        self.state
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn system_prompt_tokens(&self) -> usize {
        self.system_prompt_tokens
    }

    /// Tokens available for user content.
    pub fn available_tokens(&self) -> usize {
        self.available
    }

    /// Held blocks in insertion order, with any reductions applied.
    pub fn blocks(&self) -> &[ContextBlock] {
        &self.blocks
    }

    pub fn block(&self, name: &str) -> Option<&ContextBlock> {
        self.blocks.iter().find(|b| b.name() == name)
    }

    /// Outcome of the most recent fill pass.
    pub fn last_fill(&self) -> Option<&FillOutcome> {
        self.last_fill.as_ref()
    }

    // ── Building ───────────────────────────────────────────────────

    /// Replace the system prompt, recomputing the budget.
    ///
    /// On underflow the previous prompt is kept.
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) -> Result<(), BudgetError> {
        let prompt = prompt.into();
        let tokens = self.accountant.count(&prompt);
        self.available = content_budget(&self.model, tokens, self.config.reserve_tokens)?;
        self.system_prompt = prompt;
        self.system_prompt_tokens = tokens;
        Ok(())
    }

    /// Add a block.
    ///
    /// # Panics
    ///
    /// If the name is already held, is outside the canonical order, or the
    /// manager has finished. Use [`try_add_block`](Self::try_add_block) when
    /// block names come from data.
    pub fn add_block(&mut self, block: ContextBlock) {
        if let Err(e) = self.try_add_block(block) {
            panic!("{e}");
        }
    }

    pub fn try_add_block(&mut self, block: ContextBlock) -> Result<(), BudgetError> {
        if self.state.is_terminal() {
            return Err(BudgetError::AlreadyFinished(self.state.as_str()));
        }
        if !self.config.policy.is_known(block.name()) {
            return Err(BudgetError::UnknownBlock(block.name().to_string()));
        }
        if self.original_tokens.contains_key(block.name()) {
            return Err(BudgetError::DuplicateBlock(block.name().to_string()));
        }

        let tokens = self.accountant.count(block.content());
        debug!(
            "Added block {} (priority {}, {:?}, {} tokens)",
            block.name(),
            block.priority(),
            block.strategy(),
            tokens
        );
        self.original_tokens.insert(block.name().to_string(), tokens);
        self.blocks.push(block);
        self.state = BudgetState::Building;
        Ok(())
    }

    /// Untruncated token count of the system prompt plus every held block.
    pub fn estimated_raw_token_count(&self) -> usize {
        self.system_prompt_tokens
            + self
                .blocks
                .iter()
                .filter_map(|b| self.original_tokens.get(b.name()))
                .sum::<usize>()
    }

    /// Whether the untruncated content exceeds the input window minus reserve,
    /// i.e. whether the fill pass will have to shorten or drop something.
    pub fn exceeds_budget(&self) -> bool {
        self.estimated_raw_token_count() + self.config.reserve_tokens > self.model.max_input_tokens
    }

    // ── Filling ────────────────────────────────────────────────────

    /// Fill the budget from the held blocks and assemble both messages.
    ///
    /// Held blocks are not modified; calling this repeatedly yields the same
    /// messages.
    pub fn build_messages(&mut self) -> PromptMessages {
        let messages = self.fill_and_assemble();
        if matches!(self.state, BudgetState::Building | BudgetState::Filled) {
            self.state = BudgetState::Filled;
        }
        messages
    }

    fn fill_and_assemble(&mut self) -> PromptMessages {
        let filler = BlockFiller::new(
            &self.config.policy,
            self.config.truncation_floor,
            &self.accountant,
        );
        let outcome = filler.fill(&self.blocks, self.available);
        let user_content = assemble(&outcome.included, &self.config.policy);

        self.observer.on_event(&BudgetEvent::Filled {
            available: self.available,
            outcome: &outcome,
        });
        self.last_fill = Some(outcome);

        PromptMessages {
            system_prompt: self.system_prompt.clone(),
            user_content,
        }
    }

    // ── Sending ────────────────────────────────────────────────────

    /// Generate with `client`, reducing content and retrying while the client
    /// reports the prompt as too large.
    ///
    /// Streamed text goes to `on_delta`. Cancelling `cancel` drops the
    /// in-flight request and fails with [`BudgetError::Cancelled`]. A finished
    /// manager returns [`BudgetError::AlreadyFinished`].
    pub async fn build_with_retry<C>(
        &mut self,
        client: &C,
        params: &RequestParams,
        cancel: &CancellationToken,
        mut on_delta: impl FnMut(&str) + Send,
    ) -> Result<String, BudgetError>
    where
        C: GenerationClient + ?Sized,
    {
        if self.state.is_terminal() {
            return Err(BudgetError::AlreadyFinished(self.state.as_str()));
        }

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let messages = self.fill_and_assemble();
            self.state = BudgetState::Sending;
            let prompt_tokens =
                self.system_prompt_tokens + self.accountant.count(&messages.user_content);
            self.observer.on_event(&BudgetEvent::AttemptStarted {
                attempt,
                prompt_tokens,
            });

            let sink: DeltaSink<'_> = &mut on_delta;
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(GenerationError::Cancelled),
                r = client.generate(&self.model.id, &messages, params, sink) => r,
            };

            match result {
                Ok(text) => {
                    self.state = BudgetState::Succeeded;
                    self.observer
                        .on_event(&BudgetEvent::Succeeded { attempts: attempt });
                    return Ok(text);
                }
                Err(GenerationError::Cancelled) => {
                    self.state = BudgetState::Failed;
                    self.observer.on_event(&BudgetEvent::Cancelled { attempt });
                    return Err(BudgetError::Cancelled);
                }
                Err(GenerationError::Failed(message)) => {
                    self.state = BudgetState::Failed;
                    warn!("Generation attempt {attempt} failed: {message}");
                    return Err(BudgetError::Generation(message));
                }
                Err(GenerationError::ContextTooLarge(message)) => {
                    self.observer.on_event(&BudgetEvent::ContextTooLarge {
                        attempt,
                        message: &message,
                    });
                    self.state = BudgetState::Reducing;
                    if !self.reduce() {
                        self.state = BudgetState::Failed;
                        self.observer
                            .on_event(&BudgetEvent::Exhausted { attempts: attempt });
                        return Err(BudgetError::RequestTooLarge {
                            model: self.model.id.clone(),
                            attempts: attempt,
                        });
                    }
                }
            }
        }
    }

    /// One reducer step. `false` when nothing is left to reduce.
    fn reduce(&mut self) -> bool {
        let reducer = SmartReducer::new(
            &self.config.policy,
            self.config.truncation_floor,
            self.config.reduction_ratio,
            &self.accountant,
        );
        let Some(reduction) = reducer.reduce_once(&mut self.blocks) else {
            return false;
        };

        if let ReductionAction::Removed { .. } = reduction.action {
            self.original_tokens.remove(&reduction.name);
        }
        info!(
            "Reduced {} to retry {}, freed {} tokens",
            reduction.name,
            self.model.id,
            reduction.freed_tokens()
        );
        self.observer.on_event(&BudgetEvent::Reduced(&reduction));
        true
    }
}

impl fmt::Debug for ContextWindowManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextWindowManager")
            .field("model", &self.model.id)
            .field("state", &self.state)
            .field("available", &self.available)
            .field("blocks", &self.blocks.len())
            .finish()
    }
}

/// `max_input - system - reserve`, or an underflow error.
fn content_budget(
    model: &ModelDescriptor,
    system_prompt_tokens: usize,
    reserve_tokens: usize,
) -> Result<usize, BudgetError> {
    model
        .max_input_tokens
        .checked_sub(system_prompt_tokens)
        .and_then(|rest| rest.checked_sub(reserve_tokens))
        .ok_or_else(|| BudgetError::BudgetUnderflow {
            model: model.id.clone(),
            max_input_tokens: model.max_input_tokens,
            system_prompt_tokens,
            reserve_tokens,
        })
}
