//! Turn orchestrator
//!
//! A single logical task drives every turn, fully sequential: the three
//! suspension points (inbound utterance, generation, per-chunk ack) are
//! plain awaits with no timeout, so at most one chunk is ever in flight
//! and chunk `i + 1` is never sent before chunk `i` is acknowledged.

use std::sync::Arc;

use metrics::counter;
use uuid::Uuid;

use voice_relay_core::{
    DeliveryMode, RelayError, ReplyChannel, ReplyMessages, RequestChannel, TurnErrorPolicy,
    TurnOutcome, Utterance,
};
use voice_relay_llm::{ChatTemplate, LlmBackend, Message, SamplingParams};
use voice_relay_pipeline::{ChunkerConfig, TextChunker};

/// Status-channel notification sent before streaming begins.
const STATUS_START_PLAY: &str = "start play";
/// Status-channel round-trip confirming playback after the final chunk.
const STATUS_END_PLAY: &str = "end play";

/// Orchestrator state, one turn at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// Blocked on the next upstream utterance.
    AwaitingRequest,
    /// Blocked on the generation collaborator.
    Generating,
    /// Splitting the response into chunks.
    Chunking,
    /// Generation produced nothing chunkable; streaming is skipped.
    NoChunks,
    /// Streaming chunks downstream, ack-gated.
    Streaming,
    /// Sending the single upstream reply.
    Completing,
}

/// Orchestrator configuration, assembled from settings at startup.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub delivery_mode: DeliveryMode,
    /// Marker appended to the final chunk in status-wrapped mode.
    pub end_marker: String,
    pub replies: ReplyMessages,
    pub sampling: SamplingParams,
    pub turn_error_policy: TurnErrorPolicy,
    /// Model end-of-turn marker stripped before chunking.
    pub eot_marker: String,
    pub system_prompt: Option<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            delivery_mode: DeliveryMode::default(),
            end_marker: "END".to_string(),
            replies: ReplyMessages::default(),
            sampling: SamplingParams::default(),
            turn_error_policy: TurnErrorPolicy::default(),
            eot_marker: "<|im_end|>".to_string(),
            system_prompt: None,
        }
    }
}

/// Drives the relay's control loop.
///
/// Owns both channels exclusively for the process lifetime; turns are
/// strictly sequential, so the channels are never shared or re-entered.
pub struct TurnOrchestrator {
    upstream: Box<dyn ReplyChannel>,
    downstream: Box<dyn RequestChannel>,
    status: Option<Box<dyn RequestChannel>>,
    llm: Arc<dyn LlmBackend>,
    chunker: TextChunker,
    template: ChatTemplate,
    config: OrchestratorConfig,
    state: TurnState,
}

impl TurnOrchestrator {
    /// Create an orchestrator over its channels and generation backend.
    ///
    /// `status` is only consulted in status-wrapped delivery mode; settings
    /// validation guarantees it is present when that mode is selected.
    pub fn new(
        upstream: Box<dyn ReplyChannel>,
        downstream: Box<dyn RequestChannel>,
        status: Option<Box<dyn RequestChannel>>,
        llm: Arc<dyn LlmBackend>,
        config: OrchestratorConfig,
    ) -> Self {
        let chunker = TextChunker::new(ChunkerConfig {
            eot_marker: config.eot_marker.clone(),
        });
        let template = ChatTemplate::new(config.system_prompt.clone());

        Self {
            upstream,
            downstream,
            status,
            llm,
            chunker,
            template,
            config,
            state: TurnState::AwaitingRequest,
        }
    }

    /// Current state
    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Serve turns until a fatal error or external shutdown.
    ///
    /// Turn-fatal errors (upstream transport, generation) are handled per
    /// the configured policy: `Propagate` returns them to the caller,
    /// `Continue` logs and keeps serving.
    pub async fn run(&mut self) -> Result<(), RelayError> {
        loop {
            match self.run_turn().await {
                Ok(outcome) => {
                    tracing::info!(outcome = outcome.metric_label(), "Turn complete");
                }
                Err(e) if self.config.turn_error_policy == TurnErrorPolicy::Continue => {
                    counter!("relay_turn_errors_total").increment(1);
                    tracing::error!(error = %e, "Turn failed, continuing per policy");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Drive one full turn: receive, generate, chunk, stream, reply.
    ///
    /// Returns the turn's outcome after the upstream reply is sent, or the
    /// fatal error that ended the turn. Downstream failures never surface
    /// here; they are folded into a `DeliveryFailed` outcome.
    pub async fn run_turn(&mut self) -> Result<TurnOutcome, RelayError> {
        self.set_state(TurnState::AwaitingRequest);
        let utterance =
            Utterance::new(self.upstream.recv().await.map_err(RelayError::Upstream)?);

        let turn_id = Uuid::new_v4();
        tracing::info!(%turn_id, utterance = utterance.as_str(), "Received utterance");

        self.set_state(TurnState::Generating);
        let prompt = self
            .template
            .format_prompt(&[Message::user(utterance.as_str())]);
        let response = self
            .llm
            .generate(&prompt, &self.config.sampling)
            .await
            .map_err(|e| RelayError::Generation(e.to_string()))?;

        self.set_state(TurnState::Chunking);
        let chunks = self.chunker.chunk(&response);
        tracing::debug!(%turn_id, chunks = chunks.len(), "Chunked response");

        let outcome = if chunks.is_empty() {
            self.set_state(TurnState::NoChunks);
            TurnOutcome::NoContent
        } else {
            self.set_state(TurnState::Streaming);
            self.deliver(&chunks).await
        };

        self.set_state(TurnState::Completing);
        let reply = outcome.render(&self.config.replies);
        self.upstream
            .send(&reply)
            .await
            .map_err(RelayError::Upstream)?;

        counter!("relay_turns_total", "outcome" => outcome.metric_label()).increment(1);
        Ok(outcome)
    }

    /// Close both channels. Called once, on the shutdown path.
    pub async fn close(&mut self) {
        if let Err(e) = self.upstream.close().await {
            tracing::warn!(error = %e, "Failed to close upstream channel");
        }
        if let Err(e) = self.downstream.close().await {
            tracing::warn!(error = %e, "Failed to close downstream channel");
        }
        if let Some(status) = self.status.as_mut() {
            if let Err(e) = status.close().await {
                tracing::warn!(error = %e, "Failed to close status channel");
            }
        }
    }

    async fn deliver(&mut self, chunks: &[String]) -> TurnOutcome {
        match self.config.delivery_mode {
            DeliveryMode::AckPerChunk => self.stream_chunks(chunks, false).await,
            DeliveryMode::StatusWrapped => self.deliver_status_wrapped(chunks).await,
        }
    }

    /// Stream chunks in order, one in flight, aborting on the first
    /// failure. Already-acknowledged chunks are not retried or rolled back.
    async fn stream_chunks(&mut self, chunks: &[String], mark_last: bool) -> TurnOutcome {
        let total = chunks.len();

        for (index, chunk) in chunks.iter().enumerate() {
            let is_last = index + 1 == total;
            let message = if mark_last && is_last {
                format!("{}{}", chunk, self.config.end_marker)
            } else {
                chunk.clone()
            };

            tracing::debug!(chunk = index + 1, total, "Sending chunk downstream");
            match self.downstream.request(&message).await {
                Ok(ack) => {
                    // Any reply counts as acknowledgment; the payload is
                    // not interpreted.
                    tracing::trace!(chunk = index + 1, ack, "Chunk acknowledged");
                    counter!("relay_chunks_delivered_total").increment(1);
                }
                Err(e) => {
                    tracing::warn!(
                        chunk = index + 1,
                        total,
                        error = %e,
                        "Downstream delivery failed, aborting remaining chunks"
                    );
                    return TurnOutcome::DeliveryFailed {
                        reason: e.to_string(),
                    };
                }
            }
        }

        TurnOutcome::Delivered { chunks: total }
    }

    async fn deliver_status_wrapped(&mut self, chunks: &[String]) -> TurnOutcome {
        if self.status.is_none() {
            return TurnOutcome::DeliveryFailed {
                reason: "status channel not configured".to_string(),
            };
        }

        if let Some(status) = self.status.as_mut() {
            if let Err(e) = status.request(STATUS_START_PLAY).await {
                return TurnOutcome::DeliveryFailed {
                    reason: e.to_string(),
                };
            }
        }

        let outcome = self.stream_chunks(chunks, true).await;
        if !matches!(outcome, TurnOutcome::Delivered { .. }) {
            return outcome;
        }

        if let Some(status) = self.status.as_mut() {
            match status.request(STATUS_END_PLAY).await {
                Ok(final_status) => {
                    tracing::debug!(final_status, "Playback confirmed by peer");
                    outcome
                }
                Err(e) => TurnOutcome::DeliveryFailed {
                    reason: e.to_string(),
                },
            }
        } else {
            outcome
        }
    }

    fn set_state(&mut self, new_state: TurnState) {
        if self.state != new_state {
            tracing::trace!(from = ?self.state, to = ?new_state, "State transition");
            self.state = new_state;
        }
    }
}
