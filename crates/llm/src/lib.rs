//! LLM generation boundary for the voice relay
//!
//! The relay never runs a model in-process; generation lives behind the
//! [`LlmBackend`] trait. The HTTP backend talks to an OpenAI-compatible
//! completion server, the stub backend serves canned replies for tests
//! and model-less development.

mod backend;
mod prompt;

pub use backend::{
    create_llm_backend, HttpLlmBackend, LlmBackend, LlmError, SamplingParams, StubLlmBackend,
};
pub use voice_relay_core::LlmEngine;
pub use prompt::{ChatTemplate, Message, Role};
