//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use voice_relay_core::{DeliveryMode, LlmEngine, ReplyMessages, TurnErrorPolicy};

use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Upstream (listening) endpoint configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Downstream (speech synthesis) peer configuration
    #[serde(default)]
    pub downstream: DownstreamConfig,

    /// Generation backend configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Upstream reply texts per turn outcome
    #[serde(default)]
    pub replies: ReplyMessages,

    /// What to do when a turn fails fatally (upstream or generation error)
    #[serde(default)]
    pub turn_error_policy: TurnErrorPolicy,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.downstream.host.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "downstream.host".to_string(),
                message: "Downstream peer host must be set".to_string(),
            });
        }

        if self.downstream.delivery_mode == DeliveryMode::StatusWrapped
            && self.downstream.status_port.is_none()
        {
            return Err(ConfigError::InvalidValue {
                field: "downstream.status_port".to_string(),
                message: "status-wrapped delivery requires a status port".to_string(),
            });
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "llm.temperature".to_string(),
                message: format!("Temperature {} outside [0.0, 2.0]", self.llm.temperature),
            });
        }

        if self.llm.max_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                field: "llm.max_tokens".to_string(),
                message: "max_tokens must be positive".to_string(),
            });
        }

        Ok(())
    }
}

/// Upstream listening endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host for the upstream request-reply endpoint
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_listen_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_listen_port() -> u16 {
    6666
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_listen_port(),
        }
    }
}

/// Downstream speech-synthesis peer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownstreamConfig {
    /// Peer host
    #[serde(default = "default_downstream_host")]
    pub host: String,

    /// Data port, one chunk per request
    #[serde(default = "default_downstream_port")]
    pub port: u16,

    /// Status port for the status-wrapped protocol variant
    #[serde(default)]
    pub status_port: Option<u16>,

    /// Delivery protocol variant
    #[serde(default)]
    pub delivery_mode: DeliveryMode,

    /// Marker appended to the final chunk in status-wrapped mode
    #[serde(default = "default_end_marker")]
    pub end_marker: String,
}

fn default_downstream_host() -> String {
    "127.0.0.1".to_string()
}
fn default_downstream_port() -> u16 {
    7777
}
fn default_end_marker() -> String {
    "END".to_string()
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            host: default_downstream_host(),
            port: default_downstream_port(),
            status_port: None,
            delivery_mode: DeliveryMode::default(),
            end_marker: default_end_marker(),
        }
    }
}

/// Generation backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Backend selection: `http` for a completion server, `stub` for
    /// canned replies (model-less development)
    #[serde(default)]
    pub engine: LlmEngine,

    /// Base URL of the OpenAI-compatible completion server
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// Model name passed through to the completion server
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum generated tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// End-of-turn marker stripped from generated text before chunking
    #[serde(default = "default_eot_marker")]
    pub eot_marker: String,

    /// Optional system prompt prepended to every turn
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_llm_endpoint() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_llm_model() -> String {
    "Qwen3-0.6B".to_string()
}
fn default_temperature() -> f32 {
    0.6
}
fn default_max_tokens() -> u32 {
    256
}
fn default_eot_marker() -> String {
    "<|im_end|>".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            engine: LlmEngine::default(),
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            eot_marker: default_eot_marker(),
            system_prompt: None,
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_metrics_port() -> u16 {
    9090
}
fn default_true() -> bool {
    true
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
            metrics_port: default_metrics_port(),
        }
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (VOICE_RELAY__ prefix)
/// 2. config/{env}.yaml (if env specified)
/// 3. config/default.yaml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder = builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("VOICE_RELAY")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;
    tracing::debug!(env = env.unwrap_or("default"), "Settings loaded");

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 6666);
        assert_eq!(settings.downstream.port, 7777);
        assert_eq!(settings.llm.temperature, 0.6);
        assert_eq!(settings.llm.max_tokens, 256);
        assert_eq!(settings.turn_error_policy, TurnErrorPolicy::Propagate);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_status_wrapped_requires_status_port() {
        let mut settings = Settings::default();
        settings.downstream.delivery_mode = DeliveryMode::StatusWrapped;
        assert!(settings.validate().is_err());

        settings.downstream.status_port = Some(6677);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_sampling_validation() {
        let mut settings = Settings::default();
        settings.llm.temperature = 3.5;
        assert!(settings.validate().is_err());

        settings.llm.temperature = 0.6;
        settings.llm.max_tokens = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_policy_config_names() {
        let policy: TurnErrorPolicy = serde_json::from_str("\"continue\"").unwrap();
        assert_eq!(policy, TurnErrorPolicy::Continue);
    }

    #[test]
    fn test_engine_selection() {
        let settings = Settings::default();
        assert_eq!(settings.llm.engine, LlmEngine::Http);

        let llm: LlmConfig = serde_json::from_str(r#"{"engine": "stub"}"#).unwrap();
        assert_eq!(llm.engine, LlmEngine::Stub);
    }
}
