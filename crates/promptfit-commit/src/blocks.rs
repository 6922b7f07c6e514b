//! The standard commit-message block set.

use promptfit::context::policy::{
    CODE_CHANGES, CUSTOM_INSTRUCTIONS, RECENT_COMMITS, REMINDER, USER_COMMITS,
};
use promptfit::BudgetError;
use promptfit::context::{ContextBlock, ContextWindowManager};

use crate::prompt::DEFAULT_REMINDER;

pub const CODE_CHANGES_PRIORITY: i32 = 100;
pub const REMINDER_PRIORITY: i32 = 90;
pub const CUSTOM_INSTRUCTIONS_PRIORITY: i32 = 50;
pub const USER_COMMITS_PRIORITY: i32 = 20;
pub const RECENT_COMMITS_PRIORITY: i32 = 10;

/// Raw text inputs for one commit message.
#[derive(Debug, Clone, Default)]
pub struct CommitInputs {
    /// Unified diff of the changes to describe.
    pub diff: String,
    /// Recent repository history, newest first.
    pub recent_commits: Option<String>,
    /// The author's own previous messages, newest first.
    pub user_commits: Option<String>,
    pub custom_instructions: Option<String>,
    /// Replaces [`DEFAULT_REMINDER`].
    pub reminder: Option<String>,
}

impl CommitInputs {
    pub fn new(diff: impl Into<String>) -> Self {
        Self {
            diff: diff.into(),
            ..Default::default()
        }
    }

    /// Blocks for these inputs. Blank optional inputs produce no block.
    ///
    /// The diff is cut at file boundaries; history keeps its newest entries.
    pub fn blocks(&self) -> Vec<ContextBlock> {
        let mut blocks = vec![
            ContextBlock::diff(CODE_CHANGES, CODE_CHANGES_PRIORITY, self.diff.as_str()),
            ContextBlock::tail_cut(
                REMINDER,
                REMINDER_PRIORITY,
                non_blank(&self.reminder).unwrap_or(DEFAULT_REMINDER),
            ),
        ];
        if let Some(text) = non_blank(&self.custom_instructions) {
            blocks.push(ContextBlock::tail_cut(
                CUSTOM_INSTRUCTIONS,
                CUSTOM_INSTRUCTIONS_PRIORITY,
                text,
            ));
        }
        if let Some(text) = non_blank(&self.user_commits) {
            blocks.push(ContextBlock::tail_cut(USER_COMMITS, USER_COMMITS_PRIORITY, text));
        }
        if let Some(text) = non_blank(&self.recent_commits) {
            blocks.push(ContextBlock::tail_cut(
                RECENT_COMMITS,
                RECENT_COMMITS_PRIORITY,
                text,
            ));
        }
        blocks
    }

    /// Add every block to `manager`.
    ///
    /// Fails when a configured policy leaves one of these names out of its
    /// canonical order.
    pub fn add_to(&self, manager: &mut ContextWindowManager) -> Result<(), BudgetError> {
        for block in self.blocks() {
            manager.try_add_block(block)?;
        }
        Ok(())
    }
}

fn non_blank(text: &Option<String>) -> Option<&str> {
    text.as_deref().map(str::trim).filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CommitConfig;
    use promptfit::context::{TokenizerCache, TruncationStrategy};

    fn manager_for(config: &CommitConfig) -> ContextWindowManager {
        ContextWindowManager::new(
            config.model_descriptor(),
            "Write a commit message.",
            &TokenizerCache::new(),
            config.budget.clone(),
        )
        .unwrap()
    }

    #[test]
    fn diff_only_gets_default_reminder() {
        let blocks = CommitInputs::new("diff --git a/x b/x\n").blocks();
        let names: Vec<&str> = blocks.iter().map(|b| b.name()).collect();
        assert_eq!(names, vec![CODE_CHANGES, REMINDER]);
        assert_eq!(blocks[0].strategy(), TruncationStrategy::SmartDiffCut);
        assert_eq!(blocks[1].content(), DEFAULT_REMINDER);
    }

    #[test]
    fn blank_inputs_are_skipped() {
        let inputs = CommitInputs {
            recent_commits: Some("  \n".into()),
            custom_instructions: Some(String::new()),
            reminder: Some("\t".into()),
            ..CommitInputs::new("d")
        };
        let blocks = inputs.blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].content(), DEFAULT_REMINDER);
    }

    #[test]
    fn full_inputs_produce_every_block() {
        let inputs = CommitInputs {
            recent_commits: Some("fix: a\nfeat: b\n".into()),
            user_commits: Some("chore: c\n".into()),
            custom_instructions: Some("Use conventional commits.".into()),
            reminder: Some("One line only.".into()),
            ..CommitInputs::new("d")
        };
        let blocks = inputs.blocks();
        let names: Vec<&str> = blocks.iter().map(|b| b.name()).collect();
        assert_eq!(
            names,
            vec![CODE_CHANGES, REMINDER, CUSTOM_INSTRUCTIONS, USER_COMMITS, RECENT_COMMITS]
        );
        assert_eq!(blocks[1].content(), "One line only.");
        assert!(blocks.windows(2).all(|w| w[0].priority() > w[1].priority()));
    }

    #[test]
    fn add_to_default_policy() {
        let config = CommitConfig::default();
        let mut manager = manager_for(&config);
        let inputs = CommitInputs {
            recent_commits: Some("fix: a\n".into()),
            ..CommitInputs::new("diff --git a/x b/x\n+1\n")
        };
        inputs.add_to(&mut manager).unwrap();
        assert_eq!(manager.blocks().len(), 3);
    }

    #[test]
    fn policy_missing_a_block_name_is_an_error() {
        let config = CommitConfig::from_toml_str(
            "[budget.policy]\nforced = [\"code-changes\"]\ncanonical_order = [\"code-changes\"]",
        )
        .unwrap();
        let mut manager = manager_for(&config);
        let err = CommitInputs::new("diff --git a/x b/x\n")
            .add_to(&mut manager)
            .unwrap_err();
        assert!(matches!(err, BudgetError::UnknownBlock(name) if name == REMINDER));
    }
}
