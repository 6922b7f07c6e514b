//! Prompt text for commit message generation.

/// Appended as the `reminder` block unless the caller supplies one.
pub const DEFAULT_REMINDER: &str = "\
Reply with the commit message only: a subject line of at most 72 characters \
in the imperative mood, a blank line, then an optional body explaining why.";

/// System prompt for commit message generation.
///
/// The user message carries tagged sections (`<code-changes>`,
/// `<recent-commits>`, ...). A section marked `truncated="true"` was shortened
/// to fit the model's context window.
pub fn commit_system_prompt() -> String {
    "\
You write git commit messages. The user message contains the staged changes \
in <code-changes> and may contain <custom-instructions>, <user-commits> (the \
author's previous messages) and <recent-commits> (recent repository history).

Guidelines:
- Describe what changed and why, not how.
- Match the style of the existing history when it is shown.
- Follow custom instructions over these guidelines.
- Sections marked truncated=\"true\" are incomplete; do not speculate about \
omitted content."
        .to_string()
}

/// Human-readable rendering of both messages for `--dry-run`.
pub fn render_dry_run(system_prompt: &str, user_content: &str, tokens: usize) -> String {
    format!(
        "=== system ===\n{system_prompt}\n\n=== user ===\n{user_content}\n\n=== ~{tokens} prompt tokens ===\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_names_the_sections() {
        let prompt = commit_system_prompt();
        assert!(prompt.contains("<code-changes>"));
        assert!(prompt.contains("truncated"));
    }

    #[test]
    fn dry_run_shows_both_messages() {
        let out = render_dry_run("sys", "<reminder>\nr\n</reminder>", 12);
        assert!(out.starts_with("=== system ===\nsys\n"));
        assert!(out.contains("=== user ===\n<reminder>"));
        assert!(out.contains("~12 prompt tokens"));
    }
}
