//! Logging Metrics Consumer
//!
//! Stand-in downstream used when no collector endpoint is configured.

use async_trait::async_trait;
use prost::Message;

use crate::application::ports::{ConsumerError, MetricsConsumer};
use crate::domain::metrics::MetricsBatch;

/// Metrics consumer that logs batch summaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingConsumer;

#[async_trait]
impl MetricsConsumer for LoggingConsumer {
    async fn consume_metrics(&self, batch: MetricsBatch) -> Result<(), ConsumerError> {
        tracing::info!(
            metrics = batch.metric_count(),
            data_points = batch.data_point_count(),
            encoded_bytes = batch.as_request().encoded_len(),
            "Received metrics batch"
        );

        for metric in batch.metrics() {
            tracing::debug!(name = %metric.name, unit = %metric.unit, "Metric");
        }

        Ok(())
    }
}
