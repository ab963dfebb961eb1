//! Cloud Foundry Receiver Binary
//!
//! Streams metrics from an RLP gateway and forwards them downstream.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin cloudfoundry-receiver
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `CF_RLP_GATEWAY_ENDPOINT`: RLP gateway base URL
//! - `CF_UAA_ENDPOINT`: UAA base URL
//! - `CF_UAA_USERNAME`: UAA client identifier
//! - `CF_UAA_PASSWORD`: UAA client secret
//!
//! ## Optional
//! - `CF_RLP_GATEWAY_SHARD_ID`: Gateway shard (default: opentelemetry)
//! - `CF_RLP_GATEWAY_TIMEOUT_SECS` / `CF_UAA_TIMEOUT_SECS`: HTTP timeouts (default: 10)
//! - `CF_RLP_GATEWAY_INSECURE_SKIP_VERIFY` / `CF_UAA_INSECURE_SKIP_VERIFY`: Skip TLS verification
//! - `CF_RECEIVER_RECONNECT_*`: Gateway reconnect backoff
//! - `CF_RECEIVER_HEALTH_PORT`: Health check HTTP port (default: 8083)
//! - `CF_RECEIVER_EXPORTER_ENDPOINT`: OTLP gRPC collector; batches are logged when unset
//! - `OTEL_ENABLED`: Enable OpenTelemetry tracing (default: false)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use cloudfoundry_receiver::application::ports::MetricsConsumer;
use cloudfoundry_receiver::infrastructure::exporter::{LoggingConsumer, OtlpGrpcConsumer};
use cloudfoundry_receiver::infrastructure::health::{HealthServer, HealthServerState};
use cloudfoundry_receiver::infrastructure::host::ChannelHost;
use cloudfoundry_receiver::infrastructure::telemetry;
use cloudfoundry_receiver::{
    CloudFoundryReceiver, PrometheusObserver, ReceiverError, ServiceConfig, init_metrics,
};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Receiver label on every Prometheus series.
const RECEIVER_NAME: &str = "cloudfoundry";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init().context("failed to initialize telemetry")?;

    tracing::info!("Starting Cloud Foundry receiver");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics().context("failed to install metrics recorder")?;

    let config = ServiceConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let consumer: Arc<dyn MetricsConsumer> = match config.exporter.endpoint.as_deref() {
        Some(endpoint) => {
            tracing::info!(endpoint, "Forwarding metrics over OTLP gRPC");
            Arc::new(OtlpGrpcConsumer::connect_lazy(endpoint, &config.exporter)?)
        }
        None => {
            tracing::warn!("No exporter endpoint configured, logging metrics batches");
            Arc::new(LoggingConsumer)
        }
    };

    let receiver = CloudFoundryReceiver::builder(config.receiver, consumer)
        .with_observer(Arc::new(PrometheusObserver::new(RECEIVER_NAME)))
        .build()?;

    // Initialize health server
    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        receiver.config().rlp_gateway.shard_id.clone(),
        receiver.state_handle(),
    ));
    let health_server =
        HealthServer::new(config.server.health_port, health_state, shutdown_token.clone());

    tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    let (host, fatal_rx) = ChannelHost::new();
    receiver.start(&shutdown_token, Arc::new(host))?;

    tracing::info!("Cloud Foundry receiver ready");

    let fatal = await_shutdown(fatal_rx).await;

    receiver.shutdown()?;
    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, receiver.wait_stopped())
        .await
        .is_err()
    {
        tracing::warn!("Receiver did not stop within the shutdown timeout");
    }

    tracing::info!("Cloud Foundry receiver stopped");

    match fatal {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

/// Log the parsed configuration.
fn log_config(config: &ServiceConfig) {
    tracing::info!(
        rlp_gateway = %config.receiver.rlp_gateway.http.endpoint,
        shard_id = %config.receiver.rlp_gateway.shard_id,
        uaa = %config.receiver.uaa.http.endpoint,
        health_port = config.server.health_port,
        exporter = config.exporter.endpoint.as_deref().unwrap_or("logging"),
        "Configuration loaded"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for SIGTERM, SIGINT, or a fatal receiver error.
///
/// Returns the fatal error, if that is what ended the wait.
async fn await_shutdown(
    mut fatal_rx: mpsc::UnboundedReceiver<ReceiverError>,
) -> Option<ReceiverError> {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
            None
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
            None
        }
        Some(e) = fatal_rx.recv() => {
            tracing::error!(error = %e, "Receiver reported a fatal error, initiating shutdown");
            Some(e)
        }
    }
}
