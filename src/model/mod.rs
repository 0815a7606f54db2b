//! Dictation model client.
//!
//! [`ModelClient`] is the async contract the session scheduler invokes:
//! build a request from the frozen conversation snapshot plus the new
//! audio (or text), stream the response, and hand every content delta to
//! `on_chunk` as it arrives.  [`ApiModelClient`] implements it against any
//! OpenAI-compatible `/v1/chat/completions` endpoint.

pub mod api;
pub mod request;

pub use api::ApiModelClient;

use async_trait::async_trait;
use thiserror::Error;

use crate::audio::AudioResult;
use crate::session::ConversationSnapshot;

// ---------------------------------------------------------------------------
// ModelError
// ---------------------------------------------------------------------------

/// Errors that can occur while invoking the dictation model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The endpoint rejected the credentials (HTTP 401/403).
    #[error("model authentication failed: {0}")]
    Auth(String),

    /// The endpoint rate-limited the request (HTTP 429).
    #[error("model rate limit hit: {0}")]
    RateLimited(String),

    /// HTTP transport or connection error, or a non-success status.
    #[error("model request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("model request timed out")]
    Timeout,

    /// The request payload could not be encoded.
    #[error("failed to encode request payload: {0}")]
    Encode(String),
}

impl From<reqwest::Error> for ModelError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return ModelError::Timeout;
        }
        match e.status().map(|s| s.as_u16()) {
            Some(401) | Some(403) => ModelError::Auth(e.to_string()),
            Some(429) => ModelError::RateLimited(e.to_string()),
            _ => ModelError::Request(e.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// ModelClient trait
// ---------------------------------------------------------------------------

/// Async contract for streaming dictation model backends.
///
/// Implementors must be `Send + Sync` so one client can serve concurrent
/// model-invocation tasks behind an `Arc<dyn ModelClient>`.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Invoke the model and stream the response.
    ///
    /// `on_chunk` is called once per content delta, in network order.
    /// Returns the accumulated response text on completion (normal end,
    /// `[DONE]`, or `</xml>` early termination).
    ///
    /// # Errors
    ///
    /// Never silently returns partial text: a transport or protocol
    /// failure surfaces as a [`ModelError`] even when some chunks were
    /// already delivered.
    async fn transcribe(
        &self,
        snapshot: &ConversationSnapshot,
        input: AudioResult,
        on_chunk: &(dyn Fn(String) + Send + Sync),
    ) -> Result<String, ModelError>;
}

// ---------------------------------------------------------------------------
// MockModelClient  (test builds only)
// ---------------------------------------------------------------------------

/// One scripted model invocation: chunks to replay, an inter-chunk delay,
/// and an optional terminal failure.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MockScript {
    pub chunks: Vec<String>,
    pub chunk_delay: std::time::Duration,
    pub fail_with: Option<String>,
}

#[cfg(test)]
impl MockScript {
    pub fn chunks(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn delayed(mut self, delay: std::time::Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }
}

/// Scripted model for tests: each `transcribe` call pops the next script
/// (in dispatch order) and replays it.  Calls beyond the script queue
/// return an empty response.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockModelClient {
    scripts: std::sync::Mutex<std::collections::VecDeque<MockScript>>,
}

#[cfg(test)]
impl MockModelClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scripts(scripts: Vec<MockScript>) -> Self {
        Self {
            scripts: std::sync::Mutex::new(scripts.into()),
        }
    }

    pub fn with_chunks(chunks: &[&str]) -> Self {
        Self::with_scripts(vec![MockScript::chunks(chunks)])
    }
}

#[cfg(test)]
#[async_trait]
impl ModelClient for MockModelClient {
    async fn transcribe(
        &self,
        _snapshot: &ConversationSnapshot,
        _input: AudioResult,
        on_chunk: &(dyn Fn(String) + Send + Sync),
    ) -> Result<String, ModelError> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();

        if let Some(message) = script.fail_with {
            return Err(ModelError::Request(message));
        }

        let mut accumulated = String::new();
        for chunk in script.chunks {
            if !script.chunk_delay.is_zero() {
                tokio::time::sleep(script.chunk_delay).await;
            }
            accumulated.push_str(&chunk);
            on_chunk(chunk);
        }
        Ok(accumulated)
    }
}
