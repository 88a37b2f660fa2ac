//! Chat state owned by the caller: conversation history and the answer
//! currently being streamed.
//!
//! Neither type talks to the network. [`client::ChatClient`] drives them
//! from an HTTP response; tests and other front ends can drive them directly.

#[cfg(feature = "client")]
pub mod client;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::answer::{AnswerParser, ParsedAnswer};

/// Default number of past exchanges sent along with a new question.
pub const DEFAULT_HISTORY_WINDOW: usize = 5;

// ── History ───────────────────────────────────────────────────────────────────

/// One completed question/answer pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatExchange {
    pub user: String,
    /// Raw answer text as streamed, markers included.
    pub response: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Message shape the chat endpoint expects for prior turns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: Role,
    pub content: String,
}

/// Request body for the streaming chat endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub question: String,
    pub messages: Vec<HistoryMessage>,
}

/// Ordered list of completed exchanges. Only what the history window can
/// still send is kept, and never less than the latest exchange.
#[derive(Debug, Clone)]
pub struct Conversation {
    exchanges: Vec<ChatExchange>,
    history_window: usize,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW)
    }
}

impl Conversation {
    /// `history_window` caps how many recent exchanges accompany a question.
    /// Zero sends none.
    pub fn new(history_window: usize) -> Self {
        Self { exchanges: Vec::new(), history_window }
    }

    pub fn exchanges(&self) -> &[ChatExchange] {
        &self.exchanges
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    pub fn last_question(&self) -> Option<&str> {
        self.exchanges.last().map(|e| e.user.as_str())
    }

    /// The most recent exchanges, oldest first, flattened to
    /// user/assistant message pairs.
    pub fn history_messages(&self) -> Vec<HistoryMessage> {
        let start = self.exchanges.len().saturating_sub(self.history_window);
        self.exchanges[start..]
            .iter()
            .flat_map(|e| {
                [
                    HistoryMessage { role: Role::User, content: e.user.clone() },
                    HistoryMessage { role: Role::Assistant, content: e.response.clone() },
                ]
            })
            .collect()
    }

    /// Build the request body for `question` with the current history.
    pub fn request_for(&self, question: &str) -> ChatRequest {
        ChatRequest {
            question: question.to_string(),
            messages: self.history_messages(),
        }
    }

    pub fn record(&mut self, user: impl Into<String>, response: impl Into<String>) {
        self.exchanges.push(ChatExchange { user: user.into(), response: response.into() });
        let excess = self.exchanges.len().saturating_sub(self.history_window.max(1));
        self.exchanges.drain(..excess);
        debug!(exchanges = self.exchanges.len(), dropped = excess, "exchange recorded");
    }

    pub fn clear(&mut self) {
        self.exchanges.clear();
        debug!("conversation cleared");
    }
}

// ── In-flight answer ──────────────────────────────────────────────────────────

/// Accumulates the body of one streamed answer.
///
/// Chunks are arbitrary byte slices; a UTF-8 sequence split across two chunks
/// is held back until it is complete.
#[derive(Debug, Default)]
pub struct StreamingAnswer {
    text: String,
    pending: Vec<u8>,
    chunks: usize,
}

impl StreamingAnswer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text decoded so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.pending.is_empty()
    }

    pub fn push_chunk(&mut self, bytes: &[u8]) {
        self.chunks += 1;
        self.pending.extend_from_slice(bytes);
        self.decode_pending(false);
    }

    /// Parse what has arrived so far, in streaming mode.
    pub fn snapshot(&self, parser: &AnswerParser) -> ParsedAnswer {
        parser.parse(&self.text, true)
    }

    /// Flush any incomplete trailing bytes and return the final text.
    /// An answer that is empty after trimming is replaced with `fallback`.
    pub fn finish(mut self, fallback: &str) -> String {
        self.decode_pending(true);
        if self.text.trim().is_empty() {
            debug!(chunks = self.chunks, "empty answer, using fallback");
            return fallback.to_string();
        }
        self.text
    }

    fn decode_pending(&mut self, flush: bool) {
        while !self.pending.is_empty() {
            let (valid, invalid_len) = match std::str::from_utf8(&self.pending) {
                Ok(_) => (self.pending.len(), None),
                Err(e) => (e.valid_up_to(), e.error_len()),
            };
            self.text.push_str(&String::from_utf8_lossy(&self.pending[..valid]));

            match invalid_len {
                None if valid == self.pending.len() => self.pending.clear(),
                None => {
                    // Incomplete sequence at the end of the buffer.
                    if flush {
                        self.text.push(char::REPLACEMENT_CHARACTER);
                        self.pending.clear();
                    } else {
                        self.pending.drain(..valid);
                    }
                    return;
                }
                Some(len) => {
                    self.text.push(char::REPLACEMENT_CHARACTER);
                    self.pending.drain(..valid + len);
                }
            }
        }
    }
}
