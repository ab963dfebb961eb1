//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Configuration and collaborator wiring.
pub mod config;

/// Downstream metrics consumers (OTLP gRPC, logging).
pub mod exporter;

/// Health check HTTP endpoint.
pub mod health;

/// Host adapters receiving fatal receiver errors.
pub mod host;

/// Loggregator envelope to OTLP metric conversion.
pub mod loggregator;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// RLP gateway streaming client.
pub mod rlp;

/// OpenTelemetry tracing integration.
pub mod telemetry;

/// UAA OAuth token provider.
pub mod uaa;
