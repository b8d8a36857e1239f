//! Turn data model
//!
//! One turn flows: `Utterance` in, generated text chunked into ordered
//! playback units, exactly one `TurnOutcome` back out. Nothing here
//! outlives a single turn.

use serde::{Deserialize, Serialize};

/// One user text input for a single turn.
///
/// Received from the upstream recognition stage and consumed immediately;
/// never retained past the turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance(String);

impl Utterance {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for Utterance {
    fn from(text: String) -> Self {
        Self(text)
    }
}

/// Terminal status of a turn, reported upstream exactly once.
///
/// Produced only after every chunk is acknowledged or the first delivery
/// attempt has failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// All chunks delivered and acknowledged downstream.
    Delivered { chunks: usize },
    /// Generation produced nothing chunkable; nothing was sent downstream.
    NoContent,
    /// A downstream send or acknowledgment failed; streaming was aborted.
    DeliveryFailed { reason: String },
}

impl TurnOutcome {
    /// Render the single upstream reply for this outcome.
    pub fn render(&self, messages: &ReplyMessages) -> String {
        match self {
            TurnOutcome::Delivered { .. } => messages.delivered.clone(),
            TurnOutcome::NoContent => messages.no_content.clone(),
            TurnOutcome::DeliveryFailed { reason } => {
                format!("{}: {}", messages.delivery_failed_prefix, reason)
            }
        }
    }

    /// Label used for the `relay_turns_total` metric.
    pub fn metric_label(&self) -> &'static str {
        match self {
            TurnOutcome::Delivered { .. } => "delivered",
            TurnOutcome::NoContent => "no_content",
            TurnOutcome::DeliveryFailed { .. } => "delivery_failed",
        }
    }
}

/// Configurable reply texts for each outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyMessages {
    /// Reply when every chunk was acknowledged.
    #[serde(default = "default_delivered")]
    pub delivered: String,

    /// Reply when generation produced no chunkable text.
    #[serde(default = "default_no_content")]
    pub no_content: String,

    /// Prefix for delivery failure replies; the transport reason is appended.
    #[serde(default = "default_delivery_failed_prefix")]
    pub delivery_failed_prefix: String,
}

fn default_delivered() -> String {
    "Reply sent to speech synthesis for playback.".to_string()
}
fn default_no_content() -> String {
    "No valid reply was generated.".to_string()
}
fn default_delivery_failed_prefix() -> String {
    "Error: communication with speech synthesis failed".to_string()
}

impl Default for ReplyMessages {
    fn default() -> Self {
        Self {
            delivered: default_delivered(),
            no_content: default_no_content(),
            delivery_failed_prefix: default_delivery_failed_prefix(),
        }
    }
}

/// Downstream delivery protocol variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryMode {
    /// One send per chunk, each gated on an acknowledgment (default).
    AckPerChunk,
    /// Start/complete handshake on a status channel, end marker appended
    /// to the final chunk.
    StatusWrapped,
}

impl Default for DeliveryMode {
    fn default() -> Self {
        DeliveryMode::AckPerChunk
    }
}

/// Generation backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmEngine {
    /// OpenAI-compatible HTTP completion server (vllm, llama.cpp, ...)
    Http,
    /// Canned replies, no model
    Stub,
}

impl Default for LlmEngine {
    fn default() -> Self {
        LlmEngine::Http
    }
}

/// Policy for turn-fatal errors (upstream transport or generation).
///
/// `Propagate` exits the serve loop and leaves restarts to an external
/// process manager. `Continue` logs the error and keeps serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnErrorPolicy {
    Propagate,
    Continue,
}

impl Default for TurnErrorPolicy {
    fn default() -> Self {
        TurnErrorPolicy::Propagate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_rendering() {
        let messages = ReplyMessages::default();

        let delivered = TurnOutcome::Delivered { chunks: 3 };
        assert_eq!(delivered.render(&messages), messages.delivered);

        let empty = TurnOutcome::NoContent;
        assert_eq!(empty.render(&messages), messages.no_content);

        let failed = TurnOutcome::DeliveryFailed {
            reason: "connection closed".to_string(),
        };
        let rendered = failed.render(&messages);
        assert!(rendered.starts_with(&messages.delivery_failed_prefix));
        assert!(rendered.ends_with("connection closed"));
    }

    #[test]
    fn test_metric_labels() {
        assert_eq!(TurnOutcome::Delivered { chunks: 1 }.metric_label(), "delivered");
        assert_eq!(TurnOutcome::NoContent.metric_label(), "no_content");
        assert_eq!(
            TurnOutcome::DeliveryFailed { reason: String::new() }.metric_label(),
            "delivery_failed"
        );
    }

    #[test]
    fn test_engine_config_names() {
        let engine: LlmEngine = serde_json::from_str("\"http\"").unwrap();
        assert_eq!(engine, LlmEngine::Http);
        let engine: LlmEngine = serde_json::from_str("\"stub\"").unwrap();
        assert_eq!(engine, LlmEngine::Stub);
        assert_eq!(LlmEngine::default(), LlmEngine::Http);
    }

    #[test]
    fn test_delivery_mode_config_names() {
        let mode: DeliveryMode = serde_json::from_str("\"ack-per-chunk\"").unwrap();
        assert_eq!(mode, DeliveryMode::AckPerChunk);
        let mode: DeliveryMode = serde_json::from_str("\"status-wrapped\"").unwrap();
        assert_eq!(mode, DeliveryMode::StatusWrapped);
    }
}
