//! Commonmark rendering of the answer body.

use pulldown_cmark::{html, Options, Parser};

/// Render markdown to HTML. Blank input renders to an empty string.
///
/// Output is not sanitised; embedded HTML passes through.
pub fn markdown_to_html(markdown: &str) -> String {
    if markdown.trim().is_empty() {
        return String::new();
    }
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut out = String::with_capacity(markdown.len() + markdown.len() / 2);
    html::push_html(&mut out, Parser::new_ext(markdown, options));
    out
}
