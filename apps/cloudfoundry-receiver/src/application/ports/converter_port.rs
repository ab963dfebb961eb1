//! Envelope Converter Port
//!
//! Maps envelopes onto metric records.

use chrono::{DateTime, Utc};

use crate::domain::envelope::Envelope;
use crate::domain::metrics::MetricsSink;

/// Port for converting one envelope into zero or more metric records.
pub trait EnvelopeConverter: Send + Sync {
    /// Append the records for `envelope` to `sink`.
    ///
    /// `start_time` becomes the start timestamp of every emitted data point.
    /// Envelopes without a metric payload append nothing.
    fn convert(&self, envelope: &Envelope, sink: &mut MetricsSink<'_>, start_time: DateTime<Utc>);
}
