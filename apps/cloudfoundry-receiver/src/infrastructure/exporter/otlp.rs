//! OTLP gRPC Metrics Consumer
//!
//! Forwards each batch as an `ExportMetricsServiceRequest` to a collector's
//! `opentelemetry.proto.collector.metrics.v1.MetricsService/Export`.

use async_trait::async_trait;
use opentelemetry_proto::tonic::collector::metrics::v1::metrics_service_client::MetricsServiceClient;
use tonic::Code;
use tonic::transport::{Channel, Endpoint};

use crate::application::ports::{ConsumerError, MetricsConsumer};
use crate::domain::metrics::MetricsBatch;
use crate::infrastructure::config::ExporterSettings;

/// Metrics consumer exporting over OTLP/gRPC.
#[derive(Debug, Clone)]
pub struct OtlpGrpcConsumer {
    client: MetricsServiceClient<Channel>,
    endpoint: String,
}

impl OtlpGrpcConsumer {
    /// Create a consumer that connects lazily on the first export.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a valid URI.
    pub fn connect_lazy(endpoint: &str, settings: &ExporterSettings) -> Result<Self, ConsumerError> {
        let channel = Self::create_endpoint(endpoint, settings)?.connect_lazy();

        tracing::debug!(endpoint = %endpoint, "Created lazy connection to OTLP metrics collector");

        Ok(Self {
            client: MetricsServiceClient::new(channel),
            endpoint: endpoint.to_string(),
        })
    }

    /// Collector endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn create_endpoint(endpoint: &str, settings: &ExporterSettings) -> Result<Endpoint, ConsumerError> {
        let endpoint = Channel::from_shared(endpoint.to_string())
            .map_err(|e| ConsumerError::Unavailable {
                message: format!("invalid endpoint: {e}"),
            })?
            .connect_timeout(settings.timeout)
            .timeout(settings.timeout)
            .tcp_nodelay(true);

        Ok(endpoint)
    }
}

#[async_trait]
impl MetricsConsumer for OtlpGrpcConsumer {
    async fn consume_metrics(&self, batch: MetricsBatch) -> Result<(), ConsumerError> {
        let mut client = self.client.clone();
        let response = client
            .export(batch.into_request())
            .await
            .map_err(|status| match status.code() {
                Code::Unavailable | Code::DeadlineExceeded | Code::Cancelled => {
                    ConsumerError::Unavailable {
                        message: status.message().to_string(),
                    }
                }
                _ => ConsumerError::Refused {
                    message: format!("{}: {}", status.code(), status.message()),
                },
            })?;

        if let Some(partial) = response.into_inner().partial_success
            && partial.rejected_data_points > 0
        {
            return Err(ConsumerError::Refused {
                message: format!(
                    "{} data points rejected: {}",
                    partial.rejected_data_points, partial.error_message
                ),
            });
        }

        Ok(())
    }
}
