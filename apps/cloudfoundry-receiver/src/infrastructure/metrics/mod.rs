//! Prometheus Metrics Module
//!
//! Exposes receiver metrics via Prometheus format for monitoring.
//!
//! # Metrics
//!
//! - **Forwarding**: accepted/refused data points and forwarding latency
//! - **Intake**: envelopes pulled and batches dropped for holding no metrics
//! - **Failures**: fatal escalations
//!
//! Every series carries `receiver`, `transport` and `format` labels.
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::application::ports::{ConsumerError, MetricsOp, ReceiverObserver};
use crate::application::services::{DATA_FORMAT, TRANSPORT};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Repeated calls return the handle installed by the first.
///
/// # Errors
///
/// Returns an error if the recorder cannot be installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "cf_receiver_accepted_metric_points_total",
        "Metric data points successfully forwarded downstream"
    );
    describe_counter!(
        "cf_receiver_refused_metric_points_total",
        "Metric data points the downstream consumer failed to accept"
    );
    describe_histogram!(
        "cf_receiver_metrics_op_duration_seconds",
        "Time spent forwarding one metrics batch downstream"
    );
    describe_counter!(
        "cf_receiver_envelopes_received_total",
        "Envelopes pulled from the RLP gateway"
    );
    describe_counter!(
        "cf_receiver_batches_dropped_total",
        "Poll cycles that produced no metric records"
    );
    describe_counter!(
        "cf_receiver_fatal_errors_total",
        "Fatal errors escalated to the host"
    );
}

// =============================================================================
// Observer
// =============================================================================

/// Receiver observer recording Prometheus metrics.
#[derive(Debug, Clone)]
pub struct PrometheusObserver {
    receiver: String,
}

impl PrometheusObserver {
    /// Create an observer labelling every series with `receiver`.
    #[must_use]
    pub fn new(receiver: impl Into<String>) -> Self {
        Self {
            receiver: receiver.into(),
        }
    }

    /// Receiver label value.
    #[must_use]
    pub fn receiver(&self) -> &str {
        &self.receiver
    }
}

impl ReceiverObserver for PrometheusObserver {
    fn end_metrics_op(
        &self,
        op: MetricsOp,
        data_format: &str,
        point_count: usize,
        error: Option<&ConsumerError>,
    ) {
        let points = u64::try_from(point_count).unwrap_or(u64::MAX);
        let name = if error.is_some() {
            "cf_receiver_refused_metric_points_total"
        } else {
            "cf_receiver_accepted_metric_points_total"
        };

        counter!(
            name,
            "receiver" => self.receiver.clone(),
            "transport" => TRANSPORT,
            "format" => data_format.to_string()
        )
        .increment(points);

        histogram!(
            "cf_receiver_metrics_op_duration_seconds",
            "receiver" => self.receiver.clone(),
            "transport" => TRANSPORT,
            "format" => data_format.to_string()
        )
        .record(op.started.elapsed().as_secs_f64());
    }

    fn record_envelopes(&self, count: usize) {
        counter!(
            "cf_receiver_envelopes_received_total",
            "receiver" => self.receiver.clone(),
            "transport" => TRANSPORT,
            "format" => DATA_FORMAT
        )
        .increment(u64::try_from(count).unwrap_or(u64::MAX));
    }

    fn record_dropped_batch(&self) {
        counter!(
            "cf_receiver_batches_dropped_total",
            "receiver" => self.receiver.clone(),
            "transport" => TRANSPORT,
            "format" => DATA_FORMAT
        )
        .increment(1);
    }

    fn record_fatal_error(&self) {
        counter!(
            "cf_receiver_fatal_errors_total",
            "receiver" => self.receiver.clone(),
            "transport" => TRANSPORT,
            "format" => DATA_FORMAT
        )
        .increment(1);
    }
}

// =============================================================================
// Tests
// =============================================================================
