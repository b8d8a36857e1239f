//! Turn orchestration for the voice relay
//!
//! Owns the control loop: receive an utterance upstream, generate, chunk,
//! stream the chunks downstream gated on per-chunk acknowledgment, and
//! report exactly one outcome upstream.

mod orchestrator;

pub use orchestrator::{OrchestratorConfig, TurnOrchestrator, TurnState};
