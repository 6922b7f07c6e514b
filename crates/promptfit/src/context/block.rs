//! Context blocks: the named, prioritized units of prompt content.

use serde::{Deserialize, Serialize};

/// How a block is shortened when it does not fit whole.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TruncationStrategy {
    /// Keep the beginning, drop the end.
    TailCut,
    /// Keep the end, drop the beginning.
    HeadCut,
    /// Drop whole diff hunks from the middle, keeping the first and last.
    SmartDiffCut,
}

/// A named, prioritized, independently truncatable unit of prompt content.
///
/// Larger `priority` values are more important: they are filled first and
/// reduced last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBlock {
    name: String,
    priority: i32,
    strategy: TruncationStrategy,
    content: String,
}

impl ContextBlock {
    pub fn new(
        name: impl Into<String>,
        priority: i32,
        strategy: TruncationStrategy,
        content: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            priority,
            strategy,
            content: content.into(),
        }
    }

    /// Shorthand for a [`TruncationStrategy::TailCut`] block.
    pub fn tail_cut(name: impl Into<String>, priority: i32, content: impl Into<String>) -> Self {
        Self::new(name, priority, TruncationStrategy::TailCut, content)
    }

    /// Shorthand for a [`TruncationStrategy::HeadCut`] block.
    pub fn head_cut(name: impl Into<String>, priority: i32, content: impl Into<String>) -> Self {
        Self::new(name, priority, TruncationStrategy::HeadCut, content)
    }

    /// Shorthand for a [`TruncationStrategy::SmartDiffCut`] block.
    pub fn diff(name: impl Into<String>, priority: i32, content: impl Into<String>) -> Self {
        Self::new(name, priority, TruncationStrategy::SmartDiffCut, content)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn strategy(&self) -> TruncationStrategy {
        self.strategy
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Replace the content. Name, priority and strategy never change.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }

    /// Copy of this block carrying different content.
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..self.clone()
        }
    }

    /// Tag name used when rendering this block.
    pub fn tag_name(&self) -> String {
        tag_name(&self.name)
    }
}

/// Normalize a block name into a tag name: lower-cased, with every run of
/// non-alphanumeric characters collapsed into one hyphen and no hyphens at
/// either end.
pub fn tag_name(name: &str) -> String {
    let mut tag = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_hyphen && !tag.is_empty() {
                tag.push('-');
            }
            pending_hyphen = false;
            tag.extend(c.to_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    tag
}
