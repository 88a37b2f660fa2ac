//! Streaming answer parser and chat client for a retrieval-augmented Q&A
//! assistant.
//!
//! - [`answer`]: turns the raw, possibly partial answer text into display
//!   text, HTML, citations and follow-up questions.
//! - [`chat`]: caller-owned conversation state and the streaming HTTP client.
//! - [`console`]: append-only terminal rendering used by the binary.

pub mod answer;
pub mod chat;
pub mod config;
pub mod console;
pub mod error;
pub mod logger;

pub use answer::{parse_answer, AnswerParser, Citation, ParsedAnswer};
