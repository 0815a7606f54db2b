//! OpenAI-compatible streaming backend.
//!
//! Works with any server implementing the chat-completions API with SSE
//! streaming — Ollama, OpenAI, Groq, LM Studio, vLLM.  All connection
//! details come from [`ModelConfig`]; nothing is hardcoded.

use std::sync::Arc;

use async_trait::async_trait;

use crate::audio::AudioResult;
use crate::config::SharedConfig;
use crate::instructions::InstructionComposer;
use crate::session::ConversationSnapshot;

use super::{request, ModelClient, ModelError};

// ---------------------------------------------------------------------------
// ApiModelClient
// ---------------------------------------------------------------------------

/// Streaming client for OpenAI-compatible `/v1/chat/completions` endpoints.
///
/// The active mode is read from the shared config at request time, so a
/// mode switch applies to the next recording without rebuilding the client.
pub struct ApiModelClient {
    client: reqwest::Client,
    config: SharedConfig,
    composer: Arc<InstructionComposer>,
}

impl ApiModelClient {
    /// Build a client from application config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `model.timeout_secs`.  A default (no-timeout) client is used as a
    /// last-resort fallback if the builder fails (should never happen in
    /// practice).
    pub fn from_config(config: SharedConfig, composer: Arc<InstructionComposer>) -> Self {
        let timeout_secs = config.lock().unwrap().model.timeout_secs;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config,
            composer,
        }
    }

    fn status_error(status: reqwest::StatusCode, body: String) -> ModelError {
        match status.as_u16() {
            401 | 403 => ModelError::Auth(body),
            429 => ModelError::RateLimited(body),
            _ => ModelError::Request(format!("HTTP {status}: {body}")),
        }
    }
}

#[async_trait]
impl ModelClient for ApiModelClient {
    /// Stream one dictation request.
    ///
    /// The `Authorization: Bearer …` header is attached **only** when
    /// `model.api_key` is a non-empty string — safe for Ollama and other
    /// local providers that require no authentication.
    async fn transcribe(
        &self,
        snapshot: &ConversationSnapshot,
        input: AudioResult,
        on_chunk: &(dyn Fn(String) + Send + Sync),
    ) -> Result<String, ModelError> {
        let (model_cfg, mode) = {
            let cfg = self.config.lock().unwrap();
            (cfg.model.clone(), cfg.mode.clone())
        };

        let system_text = self.composer.compose(&mode);
        let body = request::build_request_body(&model_cfg, &system_text, snapshot, &input)?;

        let url = format!(
            "{}/v1/chat/completions",
            model_cfg.base_url.trim_end_matches('/')
        );

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = model_cfg.api_key.as_deref().filter(|k| !k.is_empty()) {
            req = req.bearer_auth(key);
        }

        let mut response = req.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, body));
        }

        // SSE framing: lines may split anywhere across network chunks, so
        // carry the partial line between reads.
        let mut accumulated = String::new();
        let mut line_buf: Vec<u8> = Vec::new();

        'stream: while let Some(bytes) = response.chunk().await? {
            line_buf.extend_from_slice(&bytes);

            while let Some(pos) = line_buf.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = line_buf.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&raw);
                let line = line.trim();

                if line.is_empty() {
                    continue;
                }
                let Some(data) = line.strip_prefix("data: ") else {
                    continue;
                };
                if data == "[DONE]" {
                    break 'stream;
                }

                let event: serde_json::Value = match serde_json::from_str(data) {
                    Ok(value) => value,
                    Err(e) => {
                        log::debug!("model: skipping unparseable SSE event: {e}");
                        continue;
                    }
                };

                if let Some(content) = event["choices"][0]["delta"]["content"].as_str() {
                    if !content.is_empty() {
                        accumulated.push_str(content);
                        on_chunk(content.to_string());

                        if model_cfg.early_terminate_on_xml_close
                            && accumulated.contains("</xml>")
                        {
                            log::debug!("model: </xml> seen, terminating stream early");
                            break 'stream;
                        }
                    }
                }

                if event["choices"][0]["finish_reason"].as_str() == Some("stop") {
                    break 'stream;
                }
            }
        }

        Ok(accumulated)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
