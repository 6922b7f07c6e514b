//! Retention and ordering rules for context blocks.
//!
//! A [`BlockPolicy`] names the blocks that must never be dropped (the forced
//! set) and the only legal left-to-right order of blocks in the assembled
//! prompt. The defaults cover the commit-message and summary workflows; tests
//! and other workflows inject their own.

use serde::{Deserialize, Serialize};

/// Diff of the changes being described.
pub const CODE_CHANGES: &str = "code-changes";
/// Closing instructions repeated after the diff.
pub const REMINDER: &str = "reminder";
/// User-supplied instructions.
pub const CUSTOM_INSTRUCTIONS: &str = "custom-instructions";
/// Recent commits on the repository, for style reference.
pub const RECENT_COMMITS: &str = "recent-commits";
/// The current user's own recent commits.
pub const USER_COMMITS: &str = "user-commits";
/// Code similar to the changed code, retrieved by the caller.
pub const SIMILAR_CODE: &str = "similar-code";
/// Full original contents of the changed files.
pub const ORIGINAL_CODE: &str = "original-code";
/// Work items for a periodic report.
pub const WORK_ITEMS: &str = "work-items";

/// Forced-retention set and canonical order.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct BlockPolicy {
    /// Blocks that may be truncated but never excluded.
    pub forced: Vec<String>,
    /// Left-to-right order of blocks in the assembled content.
    pub canonical_order: Vec<String>,
}

impl Default for BlockPolicy {
    fn default() -> Self {
        Self {
            forced: vec![CODE_CHANGES.into(), REMINDER.into()],
            canonical_order: [
                CUSTOM_INSTRUCTIONS,
                USER_COMMITS,
                RECENT_COMMITS,
                WORK_ITEMS,
                SIMILAR_CODE,
                ORIGINAL_CODE,
                CODE_CHANGES,
                REMINDER,
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl BlockPolicy {
    /// Build a policy from explicit lists.
    pub fn new<F, O>(forced: F, canonical_order: O) -> Self
    where
        F: IntoIterator,
        F::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        Self {
            forced: forced.into_iter().map(Into::into).collect(),
            canonical_order: canonical_order.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_forced(&self, name: &str) -> bool {
        self.forced.iter().any(|f| f == name)
    }

    /// Position of `name` in the canonical order.
    pub fn order_of(&self, name: &str) -> Option<usize> {
        self.canonical_order.iter().position(|n| n == name)
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.order_of(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_forces_diff_and_reminder() {
        let policy = BlockPolicy::default();
        assert!(policy.is_forced(CODE_CHANGES));
        assert!(policy.is_forced(REMINDER));
        assert!(!policy.is_forced(RECENT_COMMITS));
    }

    #[test]
    fn reminder_is_last_in_default_order() {
        let policy = BlockPolicy::default();
        assert_eq!(policy.order_of(REMINDER), Some(policy.canonical_order.len() - 1));
        assert!(policy.order_of(CUSTOM_INSTRUCTIONS) < policy.order_of(CODE_CHANGES));
    }

    #[test]
    fn custom_policy() {
        let policy = BlockPolicy::new(["a"], ["b", "a"]);
        assert!(policy.is_forced("a"));
        assert_eq!(policy.order_of("a"), Some(1));
        assert!(!policy.is_known("c"));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let policy: BlockPolicy = toml::from_str("forced = [\"code-changes\"]").unwrap();
        assert_eq!(policy.forced, vec!["code-changes".to_string()]);
        assert_eq!(policy.canonical_order, BlockPolicy::default().canonical_order);
    }
}
