#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Cloud Foundry Receiver - RLP Gateway Metrics Ingestion
//!
//! Streams Loggregator envelopes from a Cloud Foundry RLP gateway shard,
//! converts counters and gauges into OpenTelemetry metrics, and forwards
//! each batch to a downstream metrics consumer.
//!
//! # Layers (inside -> outside)
//!
//! - **Domain**: Core types with no I/O
//!   - `envelope`: Loggregator v2 envelopes and batches
//!   - `metrics`: OTLP metric batches built per poll cycle
//!   - `lifecycle`: Receiver lifecycle states
//!
//! - **Application**: Receiver service and port definitions
//!   - `ports`: Token provider, envelope stream, converter, consumer, host, observer
//!   - `services`: The receiver lifecycle and streaming loop
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `uaa`: OAuth client-credentials token provider
//!   - `rlp`: RLP gateway server-sent event stream
//!   - `loggregator`: Envelope to metric conversion
//!   - `exporter`: OTLP gRPC and logging consumers
//!   - `config`: Configuration and collaborator wiring
//!   - `health`: Health check HTTP endpoint
//!
//! # Data Flow
//!
//! ```text
//! UAA ──token──┐
//!              ▼
//! RLP gateway ──SSE──► envelope stream ──► converter ──► metrics consumer
//!                                             │
//!                                             └──► observer (Prometheus)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core envelope and metric types with no I/O.
pub mod domain;

/// Application layer - Receiver service and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::envelope::{Envelope, EnvelopeBatch, EnvelopeBatchMessage};
pub use domain::lifecycle::ReceiverState;
pub use domain::metrics::MetricsBatch;

// Receiver service
pub use application::services::{
    CloudFoundryReceiver, CloudFoundryReceiverBuilder, DATA_FORMAT, ReceiverError, TRANSPORT,
};

// Infrastructure config
pub use infrastructure::config::{
    ConfigError, ExporterSettings, HttpClientSettings, ReceiverConfig, ReconnectSettings,
    RlpGatewaySettings, ServerSettings, ServiceConfig, UaaSettings,
};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::{PrometheusObserver, init_metrics};

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
