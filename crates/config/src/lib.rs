//! Configuration management for the voice relay
//!
//! Settings are layered: `config/default.yaml`, an optional environment
//! file, then `VOICE_RELAY__` environment variables. All values carry
//! serde defaults so an empty deployment starts with working values.

mod error;
mod settings;

pub use error::ConfigError;
pub use settings::{
    load_settings, DownstreamConfig, LlmConfig, ObservabilityConfig, ServerConfig, Settings,
};
