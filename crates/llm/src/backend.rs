//! Generation backends
//!
//! The relay consumes generation as one opaque synchronous call:
//! `generate(prompt) -> text`. Backends are selected at startup through
//! [`create_llm_backend`] and never invoked concurrently.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use voice_relay_core::LlmEngine;

/// Generation errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response shape: {0}")]
    ResponseShape(String),
}

/// Sampling configuration recognized by the completion server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.6,
            max_tokens: 256,
        }
    }
}

/// Generation backend trait
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generate a completion for a fully formatted prompt.
    async fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<String, LlmError>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    text: String,
}

/// HTTP backend against an OpenAI-compatible `/v1/completions` endpoint.
pub struct HttpLlmBackend {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl HttpLlmBackend {
    /// Create a new HTTP backend.
    ///
    /// `endpoint` is the server base URL (for example `http://127.0.0.1:8000`);
    /// the completions path is appended here.
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl LlmBackend for HttpLlmBackend {
    async fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<String, LlmError> {
        let url = format!("{}/v1/completions", self.endpoint.trim_end_matches('/'));

        let request = CompletionRequest {
            model: &self.model,
            prompt,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let completion: CompletionResponse = response.json().await?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ResponseShape("empty choices array".to_string()))?;

        Ok(choice.text)
    }
}

/// Stub backend serving queued canned replies.
///
/// With an empty queue it echoes the prompt tail, so the relay stays
/// exercisable without a model server.
pub struct StubLlmBackend {
    replies: parking_lot::Mutex<VecDeque<String>>,
}

impl StubLlmBackend {
    pub fn new() -> Self {
        tracing::warn!("Using stub LLM backend - replies are canned, no generation occurs");
        Self {
            replies: parking_lot::Mutex::new(VecDeque::new()),
        }
    }

    /// Queue the next canned reply.
    pub fn push_reply(&self, reply: impl Into<String>) {
        self.replies.lock().push_back(reply.into());
    }
}

impl Default for StubLlmBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmBackend for StubLlmBackend {
    async fn generate(&self, prompt: &str, _params: &SamplingParams) -> Result<String, LlmError> {
        if let Some(reply) = self.replies.lock().pop_front() {
            return Ok(reply);
        }

        // Echo the last prompt line so end-to-end flows stay observable.
        let tail = prompt.lines().rev().find(|line| !line.trim().is_empty());
        Ok(format!("You said: {}", tail.unwrap_or_default()))
    }
}

/// Create a generation backend based on engine selection.
pub fn create_llm_backend(
    engine: LlmEngine,
    endpoint: &str,
    model: &str,
) -> Arc<dyn LlmBackend> {
    match engine {
        LlmEngine::Http => {
            tracing::info!(endpoint, model, "Using HTTP LLM backend");
            Arc::new(HttpLlmBackend::new(endpoint, model))
        }
        LlmEngine::Stub => Arc::new(StubLlmBackend::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampling_defaults_match_deployment() {
        let params = SamplingParams::default();
        assert_eq!(params.temperature, 0.6);
        assert_eq!(params.max_tokens, 256);
    }

    #[test]
    fn test_completion_request_body() {
        let request = CompletionRequest {
            model: "Qwen3-0.6B",
            prompt: "hello",
            temperature: 0.6,
            max_tokens: 256,
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["model"], "Qwen3-0.6B");
        assert_eq!(body["max_tokens"], 256);
    }

    #[tokio::test]
    async fn test_stub_serves_queued_replies_in_order() {
        let stub = StubLlmBackend::new();
        stub.push_reply("first");
        stub.push_reply("second");

        let params = SamplingParams::default();
        assert_eq!(stub.generate("p", &params).await.unwrap(), "first");
        assert_eq!(stub.generate("p", &params).await.unwrap(), "second");
    }

    #[tokio::test]
    async fn test_stub_echoes_without_queue() {
        let stub = StubLlmBackend::new();
        let reply = stub
            .generate("<|im_start|>user\nhi<|im_end|>\n", &SamplingParams::default())
            .await
            .unwrap();
        assert!(reply.contains("hi"));
    }

    #[test]
    fn test_factory_selects_stub() {
        let backend = create_llm_backend(LlmEngine::Stub, "", "");
        // Just verify the factory hands back a usable trait object.
        let _: Arc<dyn LlmBackend> = backend;
    }
}
