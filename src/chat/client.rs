//! Streaming chat client for the `/chat_stream` endpoint.
//!
//! The endpoint answers a JSON `{ question, messages }` POST with a chunked
//! `text/plain` body. Every chunk is appended to a [`StreamingAnswer`] and the
//! whole text so far is re-parsed, so the caller always renders a complete
//! [`ParsedAnswer`] rather than raw deltas.
//!
//! Cancelling is dropping the future returned by [`ChatClient::ask`]; nothing
//! is recorded in the conversation for an aborted answer.

use std::time::Duration;

use reqwest::{header, Client};
use tracing::{debug, error, info, trace};

use super::{Conversation, StreamingAnswer};
use crate::answer::{AnswerParser, ParsedAnswer};
use crate::config::{ApiConfig, Config};

pub use crate::error::StreamError;

/// HTTP client bound to one chat backend. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: Client,
    endpoint: String,
    parser: AnswerParser,
    fallback_answer: String,
}

impl ChatClient {
    pub fn new(
        api: &ApiConfig,
        parser: AnswerParser,
        fallback_answer: impl Into<String>,
    ) -> Result<Self, StreamError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(api.timeout_seconds))
            .build()
            .map_err(|e| StreamError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat_stream", api.base_url.trim_end_matches('/')),
            parser,
            fallback_answer: fallback_answer.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, StreamError> {
        Self::new(&config.api, config.parser.clone(), config.answer.fallback_answer.clone())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn parser(&self) -> &AnswerParser {
        &self.parser
    }

    /// Ask `question` with the recent history of `conversation`.
    ///
    /// `on_update` sees a streaming parse after every received chunk. The
    /// final, non-streaming parse is returned and the exchange is recorded.
    pub async fn ask<F>(
        &self,
        conversation: &mut Conversation,
        question: &str,
        mut on_update: F,
    ) -> Result<ParsedAnswer, StreamError>
    where
        F: FnMut(&ParsedAnswer),
    {
        let request = conversation.request_for(question);
        debug!(
            endpoint = %self.endpoint,
            question_len = question.len(),
            history = request.messages.len(),
            "sending chat request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header(header::ACCEPT, "text/plain")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(endpoint = %self.endpoint, error = %e, "chat request failed (transport)");
                StreamError::Request(e.to_string())
            })?;

        let mut response = check_status(response).await?;

        let mut answer = StreamingAnswer::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| {
            error!(error = %e, "chat stream interrupted");
            StreamError::Request(format!("stream interrupted: {e}"))
        })? {
            trace!(bytes = chunk.len(), "chunk received");
            answer.push_chunk(&chunk);
            on_update(&answer.snapshot(&self.parser));
        }

        let chunks = answer.chunks();
        let text = answer.finish(&self.fallback_answer);
        let parsed = self.parser.parse(&text, false);
        info!(
            chunks,
            answer_len = text.len(),
            citations = parsed.citations.len(),
            followups = parsed.followup_questions.len(),
            "answer complete"
        );

        conversation.record(question, text);
        Ok(parsed)
    }
}

/// Return the response if successful, otherwise a status error with the body.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());

    error!(%status, body = %body, "chat endpoint returned HTTP error");
    Err(StreamError::Status { status: status.as_u16(), body })
}
