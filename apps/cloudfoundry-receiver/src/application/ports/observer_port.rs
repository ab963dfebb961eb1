//! Receiver Observer Port
//!
//! Observability hook recording the outcome of each forwarding operation.

use std::time::Instant;

use super::ConsumerError;

/// An in-flight forwarding operation.
#[derive(Debug, Clone, Copy)]
pub struct MetricsOp {
    /// When the operation started.
    pub started: Instant,
}

impl MetricsOp {
    /// Begin an operation now.
    #[must_use]
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

/// Port for recording receiver activity.
pub trait ReceiverObserver: Send + Sync {
    /// Begin a forwarding operation.
    fn start_metrics_op(&self) -> MetricsOp {
        MetricsOp::start()
    }

    /// Finish a forwarding operation.
    fn end_metrics_op(
        &self,
        op: MetricsOp,
        data_format: &str,
        point_count: usize,
        error: Option<&ConsumerError>,
    );

    /// Record envelopes pulled from the stream in one cycle.
    fn record_envelopes(&self, _count: usize) {}

    /// Record a batch dropped for holding no metric records.
    fn record_dropped_batch(&self) {}

    /// Record a fatal escalation.
    fn record_fatal_error(&self) {}
}

/// Observer that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl ReceiverObserver for NoOpObserver {
    fn end_metrics_op(
        &self,
        _op: MetricsOp,
        _data_format: &str,
        _point_count: usize,
        _error: Option<&ConsumerError>,
    ) {
    }
}
