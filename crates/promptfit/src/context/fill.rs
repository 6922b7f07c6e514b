//! Greedy budget filling.
//!
//! Blocks are split into the forced-retention group and the ordinary group.
//! Each group is sorted by priority (larger first, ties in insertion order)
//! and filled in one pass: forced blocks first, then ordinary blocks.
//!
//! - A block that fits is included verbatim.
//! - A forced block that does not fit is truncated to whatever budget is left
//!   and included anyway.
//! - An ordinary block that does not fit is truncated into the remaining
//!   budget when more than the truncation floor is left; either way, every
//!   ordinary block after it is excluded.

use super::block::ContextBlock;
use super::policy::BlockPolicy;
use super::tokens::TokenAccountant;
use super::truncate::truncate;
use tracing::debug;

/// A block accepted by the fill pass, possibly shortened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludedBlock {
    pub block: ContextBlock,
    /// Token count of the included content.
    pub tokens: usize,
    /// Whether the content was shortened to fit.
    pub truncated: bool,
}

/// Result of one fill pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillOutcome {
    /// Included blocks in fill order.
    pub included: Vec<IncludedBlock>,
    /// Names of blocks left out, in traversal order.
    pub excluded_names: Vec<String>,
    /// Budget left after the pass.
    pub remaining: usize,
}

impl FillOutcome {
    /// Names of included blocks in fill order.
    pub fn included_names(&self) -> Vec<&str> {
        self.included.iter().map(|b| b.block.name()).collect()
    }

    /// Names of included blocks that were shortened.
    pub fn truncated_names(&self) -> Vec<&str> {
        self.included
            .iter()
            .filter(|b| b.truncated)
            .map(|b| b.block.name())
            .collect()
    }

    /// Sum of included token counts.
    pub fn used_tokens(&self) -> usize {
        self.included.iter().map(|b| b.tokens).sum()
    }

    pub fn is_included(&self, name: &str) -> bool {
        self.included.iter().any(|b| b.block.name() == name)
    }
}

/// Partitions and fills blocks under a [`BlockPolicy`].
#[derive(Debug)]
pub struct BlockFiller<'a> {
    policy: &'a BlockPolicy,
    truncation_floor: usize,
    accountant: &'a TokenAccountant,
}

impl<'a> BlockFiller<'a> {
    pub fn new(
        policy: &'a BlockPolicy,
        truncation_floor: usize,
        accountant: &'a TokenAccountant,
    ) -> Self {
        Self {
            policy,
            truncation_floor,
            accountant,
        }
    }

    /// Split into `(forced, ordinary)`, each sorted most important first.
    pub fn partition<'b>(
        &self,
        blocks: &'b [ContextBlock],
    ) -> (Vec<&'b ContextBlock>, Vec<&'b ContextBlock>) {
        let (mut forced, mut ordinary): (Vec<_>, Vec<_>) = blocks
            .iter()
            .partition(|b| self.policy.is_forced(b.name()));
        // Stable: equal priorities keep insertion order.
        forced.sort_by_key(|b| std::cmp::Reverse(b.priority()));
        ordinary.sort_by_key(|b| std::cmp::Reverse(b.priority()));
        (forced, ordinary)
    }

    /// Fill `available` tokens from `blocks`.
    pub fn fill(&self, blocks: &[ContextBlock], available: usize) -> FillOutcome {
        let (forced, ordinary) = self.partition(blocks);
        let mut outcome = FillOutcome {
            remaining: available,
            ..Default::default()
        };

        for block in forced {
            let tokens = self.accountant.count(block.content());
            if tokens <= outcome.remaining {
                self.include_whole(&mut outcome, block, tokens);
            } else {
                debug!(
                    "Forced block {} needs {} tokens, {} left; truncating",
                    block.name(),
                    tokens,
                    outcome.remaining
                );
                self.include_truncated(&mut outcome, block);
            }
        }

        let mut rest = ordinary.into_iter();
        while let Some(block) = rest.next() {
            let tokens = self.accountant.count(block.content());
            if tokens <= outcome.remaining {
                self.include_whole(&mut outcome, block, tokens);
                continue;
            }

            if outcome.remaining > self.truncation_floor {
                debug!(
                    "Block {} needs {} tokens, {} left; truncating and stopping",
                    block.name(),
                    tokens,
                    outcome.remaining
                );
                self.include_truncated(&mut outcome, block);
            } else {
                debug!(
                    "Block {} excluded: {} tokens left is at or below the floor of {}",
                    block.name(),
                    outcome.remaining,
                    self.truncation_floor
                );
                outcome.excluded_names.push(block.name().to_string());
            }
            outcome
                .excluded_names
                .extend(rest.by_ref().map(|b| b.name().to_string()));
            break;
        }

        outcome
    }

    fn include_whole(&self, outcome: &mut FillOutcome, block: &ContextBlock, tokens: usize) {
        outcome.remaining -= tokens;
        outcome.included.push(IncludedBlock {
            block: block.clone(),
            tokens,
            truncated: false,
        });
    }

    fn include_truncated(&self, outcome: &mut FillOutcome, block: &ContextBlock) {
        let content = truncate(block, outcome.remaining, self.accountant);
        let tokens = self.accountant.count(&content);
        outcome.remaining = outcome.remaining.saturating_sub(tokens);
        outcome.included.push(IncludedBlock {
            block: block.with_content(content),
            tokens,
            truncated: true,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::block::TruncationStrategy;

    fn policy() -> BlockPolicy {
        BlockPolicy::new(["forced-a", "forced-b"], ["b1", "b2", "b3", "forced-a", "forced-b"])
    }

    fn ordinary(name: &str, priority: i32, len: usize) -> ContextBlock {
        ContextBlock::tail_cut(name, priority, "x".repeat(len))
    }

    #[test]
    fn three_ordinary_blocks_example() {
        let policy = policy();
        let acct = TokenAccountant::chars("m");
        let filler = BlockFiller::new(&policy, 100, &acct);
        let blocks = vec![
            ordinary("b1", 30, 400),
            ordinary("b2", 20, 400),
            ordinary("b3", 10, 400),
        ];

        let outcome = filler.fill(&blocks, 850);
        assert_eq!(outcome.included_names(), vec!["b1", "b2"]);
        assert_eq!(outcome.excluded_names, vec!["b3".to_string()]);
        assert_eq!(outcome.remaining, 50);
        assert!(outcome.truncated_names().is_empty());
    }

    #[test]
    fn oversized_forced_block_is_truncated_not_dropped() {
        let policy = policy();
        let acct = TokenAccountant::chars("m");
        let filler = BlockFiller::new(&policy, 100, &acct);
        let blocks = vec![
            ContextBlock::diff("forced-a", 100, "d".repeat(1200)),
            ordinary("b1", 50, 10),
        ];

        let outcome = filler.fill(&blocks, 850);
        assert_eq!(outcome.included_names(), vec!["forced-a"]);
        assert_eq!(outcome.truncated_names(), vec!["forced-a"]);
        assert!(outcome.included[0].tokens <= 850);
        assert_eq!(outcome.excluded_names, vec!["b1".to_string()]);
    }

    #[test]
    fn forced_blocks_fill_before_higher_priority_ordinary() {
        let policy = policy();
        let acct = TokenAccountant::chars("m");
        let filler = BlockFiller::new(&policy, 100, &acct);
        let blocks = vec![
            ordinary("b1", 1000, 500),
            ContextBlock::tail_cut("forced-a", 1, "f".repeat(500)),
        ];

        let outcome = filler.fill(&blocks, 600);
        assert_eq!(outcome.included_names(), vec!["forced-a"]);
        assert_eq!(outcome.excluded_names, vec!["b1".to_string()]);
    }

    #[test]
    fn every_forced_block_survives_exhausted_budget() {
        let policy = policy();
        let acct = TokenAccountant::chars("m");
        let filler = BlockFiller::new(&policy, 100, &acct);
        let blocks = vec![
            ContextBlock::tail_cut("forced-a", 2, "a".repeat(300)),
            ContextBlock::tail_cut("forced-b", 1, "b".repeat(300)),
        ];

        let outcome = filler.fill(&blocks, 200);
        assert_eq!(outcome.included_names(), vec!["forced-a", "forced-b"]);
        assert_eq!(outcome.included[0].tokens, 200);
        assert_eq!(outcome.included[1].tokens, 0);
        assert!(outcome.excluded_names.is_empty());
        assert_eq!(outcome.remaining, 0);
    }

    #[test]
    fn ordinary_truncation_above_floor_stops_the_pass() {
        let policy = policy();
        let acct = TokenAccountant::chars("m");
        let filler = BlockFiller::new(&policy, 100, &acct);
        let blocks = vec![
            ordinary("b1", 3, 100),
            ordinary("b2", 2, 1000),
            ordinary("b3", 1, 5),
        ];

        let outcome = filler.fill(&blocks, 400);
        assert_eq!(outcome.included_names(), vec!["b1", "b2"]);
        assert_eq!(outcome.truncated_names(), vec!["b2"]);
        assert_eq!(outcome.included[1].tokens, 300);
        // b3 would have fit but the pass stops after a truncation.
        assert_eq!(outcome.excluded_names, vec!["b3".to_string()]);
        assert_eq!(outcome.remaining, 0);
    }

    #[test]
    fn ordinary_blocks_fill_in_descending_priority() {
        let policy = policy();
        let acct = TokenAccountant::chars("m");
        let filler = BlockFiller::new(&policy, 0, &acct);
        let blocks = vec![
            ordinary("b3", 1, 10),
            ordinary("b1", 9, 10),
            ordinary("b2", 5, 10),
        ];
        let outcome = filler.fill(&blocks, 1000);
        assert_eq!(outcome.included_names(), vec!["b1", "b2", "b3"]);
    }

    #[test]
    fn equal_priorities_keep_insertion_order() {
        let policy = policy();
        let acct = TokenAccountant::chars("m");
        let filler = BlockFiller::new(&policy, 0, &acct);
        let blocks = vec![ordinary("b2", 5, 1), ordinary("b1", 5, 1), ordinary("b3", 5, 1)];
        let (_, ordinary) = filler.partition(&blocks);
        let names: Vec<&str> = ordinary.iter().map(|b| b.name()).collect();
        assert_eq!(names, vec!["b2", "b1", "b3"]);
    }

    #[test]
    fn used_tokens_never_exceed_available() {
        let policy = policy();
        let acct = TokenAccountant::chars("m");
        let filler = BlockFiller::new(&policy, 100, &acct);
        for available in [0, 50, 101, 333, 850, 5000] {
            let blocks = vec![
                ContextBlock::diff("forced-a", 9, "d".repeat(700)),
                ContextBlock::head_cut("forced-b", 8, "r".repeat(90)),
                ordinary("b1", 7, 250),
                ContextBlock::new("b2", 6, TruncationStrategy::HeadCut, "h".repeat(600)),
                ordinary("b3", 5, 40),
            ];
            let outcome = filler.fill(&blocks, available);
            assert!(outcome.used_tokens() <= available, "available={available}");
            assert_eq!(outcome.used_tokens() + outcome.remaining, available);
            assert!(outcome.is_included("forced-a") && outcome.is_included("forced-b"));
        }
    }
}
