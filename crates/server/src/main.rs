//! Voice Relay Server Entry Point

use anyhow::Context;

use voice_relay_config::{load_settings, Settings};
use voice_relay_core::RequestChannel;
use voice_relay_llm::{create_llm_backend, SamplingParams};
use voice_relay_orchestrator::{OrchestratorConfig, TurnOrchestrator};
use voice_relay_transport::{TcpReplyChannel, TcpRequestChannel};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = std::env::var("VOICE_RELAY_ENV").ok();
    let settings = load_settings(env.as_deref()).context("Failed to load settings")?;

    init_tracing(&settings);
    tracing::info!("Starting Voice Relay v{}", env!("CARGO_PKG_VERSION"));

    if settings.observability.metrics_enabled {
        init_metrics(settings.observability.metrics_port)?;
        tracing::info!(port = settings.observability.metrics_port, "Prometheus metrics enabled");
    }

    let llm = create_llm_backend(settings.llm.engine, &settings.llm.endpoint, &settings.llm.model);

    let upstream_addr = format!("{}:{}", settings.server.host, settings.server.port);
    let upstream = TcpReplyChannel::bind(&upstream_addr)
        .await
        .with_context(|| format!("Failed to bind upstream endpoint {upstream_addr}"))?;

    let downstream_addr = format!("{}:{}", settings.downstream.host, settings.downstream.port);
    let downstream = TcpRequestChannel::connect(downstream_addr.clone())
        .await
        .with_context(|| format!("Failed to connect to downstream peer {downstream_addr}"))?;

    let status: Option<Box<dyn RequestChannel>> = match settings.downstream.status_port {
        Some(port) => {
            let status_addr = format!("{}:{}", settings.downstream.host, port);
            let channel = TcpRequestChannel::connect(status_addr.clone())
                .await
                .with_context(|| format!("Failed to connect to status peer {status_addr}"))?;
            Some(Box::new(channel))
        }
        None => None,
    };

    let config = OrchestratorConfig {
        delivery_mode: settings.downstream.delivery_mode,
        end_marker: settings.downstream.end_marker.clone(),
        replies: settings.replies.clone(),
        sampling: SamplingParams {
            temperature: settings.llm.temperature,
            max_tokens: settings.llm.max_tokens,
        },
        turn_error_policy: settings.turn_error_policy,
        eot_marker: settings.llm.eot_marker.clone(),
        system_prompt: settings.llm.system_prompt.clone(),
    };

    let mut orchestrator =
        TurnOrchestrator::new(Box::new(upstream), Box::new(downstream), status, llm, config);

    tracing::info!(
        upstream = upstream_addr,
        downstream = downstream_addr,
        "Voice relay serving"
    );

    tokio::select! {
        result = orchestrator.run() => {
            result.context("Turn loop failed")?;
        }
        _ = shutdown_signal() => {
            tracing::info!("Shutdown signal received");
        }
    }

    // Sole exit path: release both channels before leaving.
    orchestrator.close().await;
    tracing::info!("Voice relay shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

/// Initialize tracing with env-filter and optional JSON output
fn init_tracing(settings: &Settings) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("voice_relay={}", settings.observability.log_level).into());

    let fmt_layer = if settings.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// Install the Prometheus exporter on its own listener
fn init_metrics(port: u16) -> anyhow::Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus exporter")?;
    Ok(())
}
