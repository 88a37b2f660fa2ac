//! Citation block scanning.

use std::sync::LazyLock;

use regex::Regex;

use super::Citation;

// `[title](url)`. The title is bracket-delimited, so parentheses inside it
// are fine; the url ends at the first `)`.
static CITATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("citation regex is valid")
});

/// Collect every complete `[title](url)` group, left to right.
pub(crate) fn extract_citations(block: &str) -> Vec<Citation> {
    CITATION_RE
        .captures_iter(block)
        .map(|caps| Citation {
            title: caps[1].to_string(),
            url: caps[2].to_string(),
        })
        .collect()
}

/// Cut the text at a `[` that has not been closed yet.
///
/// Scans backward: a `]` seen first means every reference is closed; a `[`
/// seen first is a reference still being typed. Both are ASCII, so byte
/// positions are always char boundaries.
pub(crate) fn truncate_pending_citation(text: &str) -> &str {
    match text.rfind(['[', ']']) {
        Some(i) if text.as_bytes()[i] == b'[' => &text[..i],
        _ => text,
    }
}
