//! Metrics Consumer Port (Driven Port)
//!
//! Interface for the downstream sink of assembled metrics batches.

use async_trait::async_trait;

use crate::domain::metrics::MetricsBatch;

/// Downstream consumer error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConsumerError {
    /// Consumer could not be reached.
    #[error("metrics consumer unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },

    /// Consumer refused the batch.
    #[error("metrics consumer refused batch: {message}")]
    Refused {
        /// Error details.
        message: String,
    },
}

/// Port for forwarding metrics batches downstream.
#[async_trait]
pub trait MetricsConsumer: Send + Sync {
    /// Accept a completed batch.
    async fn consume_metrics(&self, batch: MetricsBatch) -> Result<(), ConsumerError>;
}
