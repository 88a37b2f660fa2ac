//! Follow-up question markers: `<<question>>`.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static FOLLOWUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<<([^>]+)>>").expect("follow-up marker regex is valid"));

/// Remove every closed `<<...>>` marker and return the remaining text plus the
/// marker contents in order. An unclosed marker is left in place; it matches
/// on a later call once its `>>` arrives.
pub(crate) fn extract_followups(text: &str) -> (String, Vec<String>) {
    let mut questions = Vec::new();
    let stripped = FOLLOWUP_RE.replace_all(text, |caps: &Captures<'_>| {
        questions.push(caps[1].to_string());
        ""
    });
    (stripped.into_owned(), questions)
}
