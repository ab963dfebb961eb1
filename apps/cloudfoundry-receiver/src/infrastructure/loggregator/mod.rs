//! Loggregator Adapter
//!
//! Conversion of loggregator v2 envelopes into OTLP metric records.

mod converter;

pub use converter::{ATTRIBUTE_PREFIX, LoggregatorConverter};
