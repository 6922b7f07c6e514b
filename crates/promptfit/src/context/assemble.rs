//! Render included blocks into the tagged user content.

use super::fill::IncludedBlock;
use super::policy::BlockPolicy;

/// Render `included` in canonical order, separated by blank lines.
///
/// # Panics
///
/// If a block name is outside the policy's canonical order. The
/// [`ContextWindowManager`](super::ContextWindowManager) rejects such names
/// when blocks are added.
pub fn assemble(included: &[IncludedBlock], policy: &BlockPolicy) -> String {
    assert!(
        included.iter().all(|b| policy.is_known(b.block.name())),
        "block outside the canonical order reached the assembler"
    );

    let mut ordered: Vec<&IncludedBlock> = included.iter().collect();
    ordered.sort_by_key(|b| policy.order_of(b.block.name()).unwrap_or(usize::MAX));

    ordered
        .iter()
        .map(|b| render_block(&b.block.tag_name(), b.block.content(), b.truncated))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// `<tag>\ncontent\n</tag>`, with a `truncated="true"` attribute when shortened.
pub fn render_block(tag: &str, content: &str, truncated: bool) -> String {
    if truncated {
        format!("<{tag} truncated=\"true\">\n{content}\n</{tag}>")
    } else {
        format!("<{tag}>\n{content}\n</{tag}>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::block::ContextBlock;

    fn included(name: &str, content: &str, truncated: bool) -> IncludedBlock {
        IncludedBlock {
            block: ContextBlock::tail_cut(name, 0, content),
            tokens: content.len(),
            truncated,
        }
    }

    #[test]
    fn renders_plain_and_truncated_tags() {
        assert_eq!(render_block("reminder", "be brief", false), "<reminder>\nbe brief\n</reminder>");
        assert_eq!(
            render_block("code-changes", "diff", true),
            "<code-changes truncated=\"true\">\ndiff\n</code-changes>"
        );
    }

    #[test]
    fn output_follows_canonical_order() {
        let policy = BlockPolicy::default();
        let blocks = vec![
            included("reminder", "r", false),
            included("code-changes", "c", true),
            included("custom-instructions", "i", false),
        ];
        let out = assemble(&blocks, &policy);
        assert_eq!(
            out,
            "<custom-instructions>\ni\n</custom-instructions>\n\n\
             <code-changes truncated=\"true\">\nc\n</code-changes>\n\n\
             <reminder>\nr\n</reminder>"
        );
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let policy = BlockPolicy::default();
        let names = ["recent-commits", "code-changes", "reminder", "user-commits"];
        let forward: Vec<_> = names.iter().map(|n| included(n, n, false)).collect();
        let backward: Vec<_> = names.iter().rev().map(|n| included(n, n, false)).collect();
        assert_eq!(assemble(&forward, &policy), assemble(&backward, &policy));
    }

    #[test]
    #[should_panic(expected = "canonical order")]
    fn unknown_name_panics() {
        let blocks = vec![included("scratch-notes", "n", false)];
        assemble(&blocks, &BlockPolicy::default());
    }

    #[test]
    fn empty_set_renders_nothing() {
        assert_eq!(assemble(&[], &BlockPolicy::default()), "");
    }
}
