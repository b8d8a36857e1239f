//! Text processing pipeline for the voice relay
//!
//! Currently a single stage: the sentence chunker that turns one generated
//! response into ordered, punctuation-terminated playback units.

mod chunker;

pub use chunker::{ChunkerConfig, TextChunker};
