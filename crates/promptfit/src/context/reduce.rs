//! Second-chance reduction after a send still reports the prompt as too large.
//!
//! Each call touches exactly one block: the lowest-priority block outside the
//! forced set (the most recently added one on ties). Blocks above the
//! truncation floor shrink to `ratio` of their current size; blocks at or
//! below it are removed.

use super::block::ContextBlock;
use super::policy::BlockPolicy;
use super::tokens::TokenAccountant;
use super::truncate::truncate;
use tracing::debug;

/// What a reduction did to its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReductionAction {
    Truncated { from: usize, to: usize },
    Removed { tokens: usize },
}

/// One reduction step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduction {
    pub name: String,
    pub action: ReductionAction,
}

impl Reduction {
    /// Tokens released by this step.
    pub fn freed_tokens(&self) -> usize {
        match self.action {
            ReductionAction::Truncated { from, to } => from - to,
            ReductionAction::Removed { tokens } => tokens,
        }
    }
}

#[derive(Debug)]
pub struct SmartReducer<'a> {
    policy: &'a BlockPolicy,
    truncation_floor: usize,
    ratio: f64,
    accountant: &'a TokenAccountant,
}

impl<'a> SmartReducer<'a> {
    /// `ratio` must lie in `(0, 1)`; [`BudgetConfig::validate`](crate::BudgetConfig::validate)
    /// enforces this for configured values.
    pub fn new(
        policy: &'a BlockPolicy,
        truncation_floor: usize,
        ratio: f64,
        accountant: &'a TokenAccountant,
    ) -> Self {
        Self {
            policy,
            truncation_floor,
            ratio,
            accountant,
        }
    }

    /// Reduce one block in place. `None` when nothing is left to reduce.
    pub fn reduce_once(&self, blocks: &mut Vec<ContextBlock>) -> Option<Reduction> {
        let index = blocks
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, b)| !self.policy.is_forced(b.name()))
            .min_by_key(|(_, b)| b.priority())
            .map(|(i, _)| i)?;

        let tokens = self.accountant.count(blocks[index].content());
        let reduction = if tokens > self.truncation_floor {
            let target = (tokens as f64 * self.ratio).floor() as usize;
            let content = truncate(&blocks[index], target.min(tokens - 1), self.accountant);
            let to = self.accountant.count(&content);
            blocks[index].set_content(content);
            Reduction {
                name: blocks[index].name().to_string(),
                action: ReductionAction::Truncated { from: tokens, to },
            }
        } else {
            let removed = blocks.remove(index);
            Reduction {
                name: removed.name().to_string(),
                action: ReductionAction::Removed { tokens },
            }
        };

        debug!("Reduced {}: {:?}", reduction.name, reduction.action);
        Some(reduction)
    }
}
