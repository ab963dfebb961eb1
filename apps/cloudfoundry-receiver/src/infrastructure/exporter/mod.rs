//! Downstream Metrics Consumers
//!
//! - `OtlpGrpcConsumer`: exports batches to an OTLP/gRPC collector
//! - `LoggingConsumer`: logs batch summaries (no collector configured)

mod logging;
mod otlp;

pub use logging::LoggingConsumer;
pub use otlp::OtlpGrpcConsumer;
