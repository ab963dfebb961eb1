//! Metrics Batch Assembly
//!
//! Builds the metrics document forwarded downstream once per poll cycle.
//! Every document has exactly one resource node holding exactly one
//! instrumentation-library (scope) node named [`INSTRUMENTATION_LIBRARY_NAME`].
//! Converted metric records are appended to that scope through a
//! [`MetricsSink`].
//!
//! ```text
//! ExportMetricsServiceRequest
//! └── ResourceMetrics (1)
//!     └── ScopeMetrics (1, name = "otelcol/cloudfoundry")
//!         └── Metric (0..n)
//! ```

use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::common::v1::InstrumentationScope;
use opentelemetry_proto::tonic::metrics::v1::{Metric, ResourceMetrics, ScopeMetrics, metric};
use opentelemetry_proto::tonic::resource::v1::Resource;

/// Name of the instrumentation library that owns every forwarded metric.
pub const INSTRUMENTATION_LIBRARY_NAME: &str = "otelcol/cloudfoundry";

// =============================================================================
// Metrics Batch
// =============================================================================

/// One poll cycle's metrics document.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsBatch {
    request: ExportMetricsServiceRequest,
}

impl MetricsBatch {
    /// Create a fresh, empty document for a new poll cycle.
    ///
    /// Nothing is shared between batches; each call allocates a new resource
    /// and scope node.
    #[must_use]
    pub fn new_cycle() -> Self {
        let scope_metrics = ScopeMetrics {
            scope: Some(InstrumentationScope {
                name: INSTRUMENTATION_LIBRARY_NAME.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };

        let resource_metrics = ResourceMetrics {
            resource: Some(Resource::default()),
            scope_metrics: vec![scope_metrics],
            ..Default::default()
        };

        Self {
            request: ExportMetricsServiceRequest {
                resource_metrics: vec![resource_metrics],
            },
        }
    }

    /// Handle for appending metric records to this cycle's scope node.
    pub fn sink(&mut self) -> MetricsSink<'_> {
        MetricsSink {
            metrics: &mut self.scope_mut().metrics,
        }
    }

    /// Resource nodes in the document.
    #[must_use]
    pub fn resource_metrics(&self) -> &[ResourceMetrics] {
        &self.request.resource_metrics
    }

    /// Metric records appended so far.
    #[must_use]
    pub fn metrics(&self) -> &[Metric] {
        self.request
            .resource_metrics
            .first()
            .and_then(|resource| resource.scope_metrics.first())
            .map(|scope| scope.metrics.as_slice())
            .unwrap_or_default()
    }

    /// Number of metric records in the batch.
    #[must_use]
    pub fn metric_count(&self) -> usize {
        self.metrics().len()
    }

    /// Whether the batch holds no metric records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metric_count() == 0
    }

    /// Total number of data points across all metric records.
    #[must_use]
    pub fn data_point_count(&self) -> usize {
        self.metrics().iter().map(data_points_in).sum()
    }

    /// Borrow the underlying OTLP export request.
    #[must_use]
    pub const fn as_request(&self) -> &ExportMetricsServiceRequest {
        &self.request
    }

    /// Consume the batch, yielding the OTLP export request.
    #[must_use]
    pub fn into_request(self) -> ExportMetricsServiceRequest {
        self.request
    }

    // `new_cycle` is the only constructor, so the single resource and scope
    // node always exist.
    fn scope_mut(&mut self) -> &mut ScopeMetrics {
        &mut self.request.resource_metrics[0].scope_metrics[0]
    }
}

// =============================================================================
// Metrics Sink
// =============================================================================

/// Append-only view onto a batch's metric records.
#[derive(Debug)]
pub struct MetricsSink<'a> {
    metrics: &'a mut Vec<Metric>,
}

impl MetricsSink<'_> {
    /// Append a metric record.
    pub fn push(&mut self, metric: Metric) {
        self.metrics.push(metric);
    }

    /// Number of metric records appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// Whether no metric records have been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

impl Extend<Metric> for MetricsSink<'_> {
    fn extend<I: IntoIterator<Item = Metric>>(&mut self, iter: I) {
        self.metrics.extend(iter);
    }
}

fn data_points_in(metric: &Metric) -> usize {
    match &metric.data {
        Some(metric::Data::Gauge(gauge)) => gauge.data_points.len(),
        Some(metric::Data::Sum(sum)) => sum.data_points.len(),
        Some(metric::Data::Histogram(histogram)) => histogram.data_points.len(),
        Some(metric::Data::ExponentialHistogram(histogram)) => histogram.data_points.len(),
        Some(metric::Data::Summary(summary)) => summary.data_points.len(),
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry_proto::tonic::metrics::v1::{Gauge, NumberDataPoint};
    use proptest::prelude::*;

    fn gauge_metric(name: &str, points: usize) -> Metric {
        Metric {
            name: name.to_string(),
            data: Some(metric::Data::Gauge(Gauge {
                data_points: vec![NumberDataPoint::default(); points],
            })),
            ..Default::default()
        }
    }

    #[test]
    fn new_cycle_has_single_resource_and_named_scope() {
        let batch = MetricsBatch::new_cycle();

        assert_eq!(batch.resource_metrics().len(), 1);
        let resource = &batch.resource_metrics()[0];
        assert!(resource.resource.is_some());
        assert_eq!(resource.scope_metrics.len(), 1);
        assert_eq!(
            resource.scope_metrics[0].scope.as_ref().unwrap().name,
            INSTRUMENTATION_LIBRARY_NAME
        );
        assert!(batch.is_empty());
        assert_eq!(batch.data_point_count(), 0);
    }

    #[test]
    fn sink_appends_to_scope() {
        let mut batch = MetricsBatch::new_cycle();
        {
            let mut sink = batch.sink();
            sink.push(gauge_metric("a", 1));
            sink.push(gauge_metric("b", 2));
            assert_eq!(sink.len(), 2);
        }

        assert_eq!(batch.metric_count(), 2);
        assert_eq!(batch.data_point_count(), 3);
        assert_eq!(batch.metrics()[0].name, "a");
        assert_eq!(batch.metrics()[1].name, "b");
    }

    #[test]
    fn batches_are_independent() {
        let mut first = MetricsBatch::new_cycle();
        first.sink().push(gauge_metric("a", 1));

        let second = MetricsBatch::new_cycle();
        assert!(second.is_empty());
        assert_eq!(first.metric_count(), 1);
    }

    #[test]
    fn metric_without_data_has_no_points() {
        let mut batch = MetricsBatch::new_cycle();
        batch.sink().push(Metric::default());
        assert_eq!(batch.metric_count(), 1);
        assert_eq!(batch.data_point_count(), 0);
    }

    #[test]
    fn into_request_keeps_structure() {
        let mut batch = MetricsBatch::new_cycle();
        batch.sink().extend([gauge_metric("a", 1), gauge_metric("b", 1)]);

        let request = batch.into_request();
        assert_eq!(request.resource_metrics.len(), 1);
        assert_eq!(request.resource_metrics[0].scope_metrics[0].metrics.len(), 2);
    }

    proptest! {
        #[test]
        fn structure_is_constant_for_any_metric_count(count in 0usize..64) {
            let mut batch = MetricsBatch::new_cycle();
            {
                let mut sink = batch.sink();
                for i in 0..count {
                    sink.push(gauge_metric(&format!("m{i}"), 1));
                }
            }

            prop_assert_eq!(batch.resource_metrics().len(), 1);
            prop_assert_eq!(batch.resource_metrics()[0].scope_metrics.len(), 1);
            prop_assert_eq!(
                batch.resource_metrics()[0].scope_metrics[0].scope.as_ref().map(|s| s.name.as_str()),
                Some(INSTRUMENTATION_LIBRARY_NAME)
            );
            prop_assert_eq!(batch.metric_count(), count);
        }
    }
}
