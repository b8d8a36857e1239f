//! Core types for the voice relay
//!
//! Shared building blocks used by every other crate in the workspace:
//! the turn data model, the error taxonomy, and the abstract request-reply
//! channel traits that the transport crate implements.

mod channel;
mod error;
mod types;

pub use channel::{ReplyChannel, RequestChannel};
pub use error::{RelayError, Result, TransportError};
pub use types::{DeliveryMode, LlmEngine, ReplyMessages, TurnErrorPolicy, TurnOutcome, Utterance};
