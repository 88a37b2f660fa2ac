//! Terminal rendering of a streamed answer.
//!
//! A terminal cannot take back printed text, so [`TranscriptPrinter`] only
//! appends: each update writes the part of the display text that extends what
//! is already on screen. A trailing fragment that could be the start of the
//! separator token or of a `<<question>>` marker is held until the next chunk
//! decides it.

use std::io::{self, Write};

use crate::answer::{AnswerParser, ParsedAnswer};

pub struct TranscriptPrinter {
    separator: String,
    shown: String,
}

impl TranscriptPrinter {
    pub fn new(parser: &AnswerParser) -> Self {
        Self { separator: parser.separator().to_string(), shown: String::new() }
    }

    /// Text written so far for the current answer.
    pub fn shown(&self) -> &str {
        &self.shown
    }

    /// Forget the current answer without completing it, e.g. after the
    /// stream failed or was aborted.
    pub fn reset(&mut self) {
        self.shown.clear();
    }

    /// Write whatever new text `parsed` makes visible.
    pub fn update<W: Write>(&mut self, parsed: &ParsedAnswer, out: &mut W) -> io::Result<()> {
        let stable = hold_back_open_marker(&parsed.display_text);
        let stable = hold_back_separator_prefix(stable, &self.separator);
        if let Some(delta) = stable.strip_prefix(self.shown.as_str()) {
            if !delta.is_empty() {
                out.write_all(delta.as_bytes())?;
                out.flush()?;
                self.shown.push_str(delta);
            }
        }
        Ok(())
    }

    /// Complete the answer, then list citations and follow-up questions.
    /// Resets the printer for the next answer.
    pub fn finish<W: Write>(&mut self, parsed: &ParsedAnswer, out: &mut W) -> io::Result<()> {
        let body = parsed.display_text.trim_end();
        let rest = body
            .strip_prefix(self.shown.as_str())
            .or_else(|| body.strip_prefix(self.shown.trim_end()).map(str::trim_start));
        match rest {
            Some(rest) => out.write_all(rest.as_bytes())?,
            // What was shown mid-stream is no longer a prefix; reprint in full.
            None => write!(out, "\n{body}")?,
        }
        writeln!(out)?;

        if !parsed.citations.is_empty() {
            writeln!(out, "\nSources:")?;
            for (i, c) in parsed.citations.iter().enumerate() {
                writeln!(out, "  [{}] {} <{}>", i + 1, c.title, c.url)?;
            }
        }
        if !parsed.followup_questions.is_empty() {
            writeln!(out, "\nFollow-up questions:")?;
            for (i, q) in parsed.followup_questions.iter().enumerate() {
                writeln!(out, "  /{} {}", i + 1, q)?;
            }
        }
        out.flush()?;
        self.shown.clear();
        Ok(())
    }
}

/// Cut a `<<` with no `>>` after it, or a lone trailing `<`. The parser only
/// removes closed markers, so the terminal waits for the rest.
fn hold_back_open_marker(text: &str) -> &str {
    if let Some(open) = text.rfind("<<") {
        if !text[open..].contains(">>") {
            return &text[..open];
        }
    }
    text.strip_suffix('<').unwrap_or(text)
}

fn hold_back_separator_prefix<'a>(text: &'a str, separator: &str) -> &'a str {
    (1..separator.len())
        .rev()
        .filter(|&len| separator.is_char_boundary(len))
        .find_map(|len| text.strip_suffix(&separator[..len]))
        .unwrap_or(text)
}
