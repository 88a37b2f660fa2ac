//! Incremental answer-stream parser.
//!
//! The backend streams a plain-text answer that carries two kinds of inline
//! markup:
//!
//! ```text
//! The warranty lasts two years.<<How do I file a claim?>>
//! separator[Warranty terms (2024)](https://docs/warranty.pdf)[FAQ](https://docs/faq)
//! ```
//!
//! - `<<...>>` follow-up question markers, anywhere in the text;
//! - a trailing citation block after the separator token, made of repeated
//!   `[title](url)` groups.
//!
//! [`AnswerParser::parse`] is called with the *whole* text received so far,
//! once per chunk.  It is a pure function of `(text, is_streaming)`: nothing is
//! retained between calls, and a growing input only ever gains trailing
//! citations and follow-up questions.
//!
//! Pipeline:
//!
//! ```text
//! 1. strip <<...>> markers, collect their contents
//! 2. trim trailing whitespace
//! 3. streaming only: cut at a `[` that is not closed yet
//! 4. split at the first separator token -> (content, citation block)
//! 5. extract [title](url) groups from the citation block
//! 6. render the content as commonmark HTML
//! ```

mod citations;
mod markers;
mod render;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::AppError;

pub use render::markdown_to_html;

/// Token the backend places between the answer body and its citation block.
pub const DEFAULT_SEPARATOR: &str = "separator";

/// A supporting source referenced by the answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub url: String,
}

/// Renderable view of a (possibly partial) answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedAnswer {
    /// Answer body as markdown, markers removed and in-progress tokens cut.
    pub display_text: String,
    /// `display_text` rendered to HTML. Not sanitised.
    pub answer_html: String,
    /// Citations in the order they appear in the citation block.
    pub citations: Vec<Citation>,
    /// Follow-up questions in the order they appear in the text.
    pub followup_questions: Vec<String>,
}

impl ParsedAnswer {
    /// `true` when there is nothing to show yet.
    pub fn is_empty(&self) -> bool {
        self.display_text.is_empty() && self.citations.is_empty() && self.followup_questions.is_empty()
    }
}

/// Parser configured with the backend's separator token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerParser {
    separator: String,
}

impl Default for AnswerParser {
    fn default() -> Self {
        Self { separator: DEFAULT_SEPARATOR.to_string() }
    }
}

impl AnswerParser {
    /// Build a parser splitting on `separator`. An empty token is rejected,
    /// since it would match at offset zero and swallow the whole answer.
    pub fn new(separator: impl Into<String>) -> Result<Self, AppError> {
        let separator = separator.into();
        if separator.is_empty() {
            return Err(AppError::Config("answer separator must not be empty".into()));
        }
        Ok(Self { separator })
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Parse the accumulated answer text.
    ///
    /// Pass `is_streaming = true` while more chunks are expected; the display
    /// text then never ends in a half-written citation reference. An unclosed
    /// `<<` is not matched yet and stays in the text until its `>>` arrives.
    /// Never fails: malformed fragments are left out.
    pub fn parse(&self, text: &str, is_streaming: bool) -> ParsedAnswer {
        let (stripped, followup_questions) = markers::extract_followups(text);

        let mut visible = stripped.trim_end();
        if is_streaming {
            visible = citations::truncate_pending_citation(visible);
        }

        let (content, citation_block) = match visible.split_once(self.separator.as_str()) {
            Some((content, block)) => (content, Some(block)),
            None => (visible, None),
        };

        let citations = citation_block
            .map(citations::extract_citations)
            .unwrap_or_default();

        trace!(
            input_len = text.len(),
            is_streaming,
            display_len = content.len(),
            citations = citations.len(),
            followups = followup_questions.len(),
            "parsed answer"
        );

        ParsedAnswer {
            display_text: content.to_string(),
            answer_html: markdown_to_html(content),
            citations,
            followup_questions,
        }
    }
}

/// Parse with the default separator token.
pub fn parse_answer(text: &str, is_streaming: bool) -> ParsedAnswer {
    AnswerParser::default().parse(text, is_streaming)
}
