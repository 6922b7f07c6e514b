//! Content truncation strategies.
//!
//! Every strategy returns text whose token count is at most the requested
//! ceiling, and returns the content unchanged when it already fits.
//!
//! [`TruncationStrategy::SmartDiffCut`] treats the content as a sequence of
//! per-file diff hunks (each starting with a `diff --git ` line). Whole hunks
//! are dropped from the middle, so the first and last files survive intact
//! and no hunk is severed mid-way unless the boundary hunks alone overflow.

use super::block::{ContextBlock, TruncationStrategy};
use super::tokens::{TokenAccountant, TokenId};

/// Line prefix that starts a per-file hunk.
pub const HUNK_MARKER: &str = "diff --git ";

/// Placed between the kept head and tail when a block is cut in the middle.
pub const MIDDLE_ELISION: &str = "\n\n[... content truncated ...]\n\n";

/// Marker placed before the last kept hunk when middle hunks were dropped.
pub fn hunk_elision(omitted: usize) -> String {
    format!("[... {omitted} file diff(s) omitted ...]\n")
}

/// Shorten `block`'s content to at most `max_tokens` using its own strategy.
pub fn truncate(block: &ContextBlock, max_tokens: usize, accountant: &TokenAccountant) -> String {
    truncate_text(block.content(), block.strategy(), max_tokens, accountant)
}

/// Shorten `content` to at most `max_tokens` tokens.
pub fn truncate_text(
    content: &str,
    strategy: TruncationStrategy,
    max_tokens: usize,
    accountant: &TokenAccountant,
) -> String {
    if accountant.count(content) <= max_tokens {
        return content.to_string();
    }

    let cut = match strategy {
        TruncationStrategy::TailCut => keep_head(content, max_tokens, accountant),
        TruncationStrategy::HeadCut => keep_tail(content, max_tokens, accountant),
        TruncationStrategy::SmartDiffCut => smart_diff_cut(content, max_tokens, accountant),
    };

    enforce_limit(cut, max_tokens, accountant)
}

/// Split a diff into per-file hunks. Text before the first header is part of
/// the first hunk.
pub fn split_hunks(content: &str) -> Vec<&str> {
    let starts: Vec<usize> = content
        .match_indices(HUNK_MARKER)
        .map(|(idx, _)| idx)
        .filter(|&idx| idx == 0 || content.as_bytes()[idx - 1] == b'\n')
        .skip(1)
        .collect();

    let mut hunks = Vec::with_capacity(starts.len() + 1);
    let mut rest = content;
    let mut consumed = 0;
    for start in starts {
        let (hunk, tail) = rest.split_at(start - consumed);
        hunks.push(hunk);
        rest = tail;
        consumed = start;
    }
    hunks.push(rest);
    hunks
}

// ── Strategies ─────────────────────────────────────────────────────

/// Keep the first `max_tokens` tokens.
fn keep_head(content: &str, max_tokens: usize, accountant: &TokenAccountant) -> String {
    let tokens = accountant.encode(content);
    if tokens.len() <= max_tokens {
        return content.to_string();
    }
    decode_prefix(&tokens, max_tokens, accountant)
}

/// Keep the last `max_tokens` tokens.
fn keep_tail(content: &str, max_tokens: usize, accountant: &TokenAccountant) -> String {
    let tokens = accountant.encode(content);
    if tokens.len() <= max_tokens {
        return content.to_string();
    }
    decode_suffix(&tokens, max_tokens, accountant)
}

fn smart_diff_cut(content: &str, max_tokens: usize, accountant: &TokenAccountant) -> String {
    let hunks = split_hunks(content);
    if hunks.len() < 2 {
        return cut_middle(content, max_tokens, accountant);
    }

    let counts: Vec<usize> = hunks.iter().map(|h| accountant.count(h)).collect();
    // Sized for the largest possible omission count.
    let marker_tokens = accountant.count(&hunk_elision(hunks.len()));

    let mut retained: Vec<usize> = (0..hunks.len()).collect();
    let mut total: usize = counts.iter().sum();
    let mut removed = 0;

    while retained.len() > 2 && total + if removed > 0 { marker_tokens } else { 0 } > max_tokens {
        let hunk = retained.remove(retained.len() / 2);
        total -= counts[hunk];
        removed += 1;
    }

    let last = retained.len() - 1;
    let mut out = String::with_capacity(content.len());
    for (i, &hunk) in retained.iter().enumerate() {
        if removed > 0 && i == last {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&hunk_elision(removed));
        }
        out.push_str(hunks[hunk]);
    }
    out
}

/// Keep a head and a tail joined by [`MIDDLE_ELISION`].
fn cut_middle(content: &str, max_tokens: usize, accountant: &TokenAccountant) -> String {
    let marker_tokens = accountant.count(MIDDLE_ELISION);
    if max_tokens <= marker_tokens {
        return keep_head(content, max_tokens, accountant);
    }

    let budget = max_tokens - marker_tokens;
    let tail = budget / 2;
    let head = budget - tail;
    let tokens = accountant.encode(content);

    format!(
        "{}{MIDDLE_ELISION}{}",
        decode_prefix(&tokens, head, accountant),
        decode_suffix(&tokens, tail, accountant),
    )
}

// ── Helpers ────────────────────────────────────────────────────────

/// Tail-cut until re-tokenization of `text` fits. Joined fragments can encode
/// to more tokens than their parts did.
fn enforce_limit(text: String, max_tokens: usize, accountant: &TokenAccountant) -> String {
    let count = accountant.count(&text);
    if count <= max_tokens {
        return text;
    }

    let mut target = max_tokens;
    loop {
        let candidate = keep_head(&text, target, accountant);
        let count = accountant.count(&candidate);
        if count <= max_tokens || target == 0 {
            return candidate;
        }
        target = target.saturating_sub((count - max_tokens).max(1));
    }
}

/// How many extra tokens to give up when a cut lands inside a multi-byte
/// character and the slice does not decode.
const MAX_DECODE_BACKOFF: usize = 4;

fn decode_prefix(tokens: &[TokenId], n: usize, accountant: &TokenAccountant) -> String {
    let n = n.min(tokens.len());
    for backoff in 0..=MAX_DECODE_BACKOFF {
        let k = n.saturating_sub(backoff);
        if let Ok(text) = accountant.decode(&tokens[..k]) {
            return text;
        }
        if k == 0 {
            break;
        }
    }
    String::new()
}

fn decode_suffix(tokens: &[TokenId], n: usize, accountant: &TokenAccountant) -> String {
    let n = n.min(tokens.len());
    for backoff in 0..=MAX_DECODE_BACKOFF {
        let k = n.saturating_sub(backoff);
        if let Ok(text) = accountant.decode(&tokens[tokens.len() - k..]) {
            return text;
        }
        if k == 0 {
            break;
        }
    }
    String::new()
}
