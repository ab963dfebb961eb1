//! Loggregator Envelope Types
//!
//! Domain representation of the loggregator v2 envelopes streamed by the
//! RLP gateway. The receiver engine treats an envelope as opaque; only the
//! converter looks inside.
//!
//! # Wire Format (protobuf JSON)
//!
//! ```json
//! {
//!   "timestamp": "1580428783743060000",
//!   "source_id": "uaa",
//!   "instance_id": "0",
//!   "tags": {"origin": "uaa", "deployment": "cf"},
//!   "counter": {"name": "requests", "delta": "1", "total": "42"}
//! }
//! ```
//!
//! Protobuf JSON encodes 64-bit integers as strings, so both string and
//! number encodings are accepted.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

/// All envelopes returned by one pull of the envelope stream.
///
/// `None` entries are null envelopes sent by the gateway and are skipped
/// during conversion.
pub type EnvelopeBatch = Vec<Option<Envelope>>;

// =============================================================================
// Envelope
// =============================================================================

/// One unit of telemetry emitted by the upstream gateway.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Envelope {
    /// Emission time in nanoseconds since the Unix epoch.
    #[serde(default, deserialize_with = "int_from_string_or_number")]
    pub timestamp: i64,

    /// Identifier of the emitting source (application GUID or component).
    #[serde(default)]
    pub source_id: String,

    /// Instance index of the emitting source.
    #[serde(default)]
    pub instance_id: String,

    /// Envelope tags (`origin`, `deployment`, `job`, ...).
    #[serde(default)]
    pub tags: BTreeMap<String, String>,

    /// Counter payload.
    #[serde(default)]
    pub counter: Option<Counter>,

    /// Gauge payload.
    #[serde(default)]
    pub gauge: Option<Gauge>,

    /// Log payload (not converted to metrics).
    #[serde(default)]
    pub log: Option<serde_json::Value>,

    /// Timer payload (not converted to metrics).
    #[serde(default)]
    pub timer: Option<serde_json::Value>,

    /// Event payload (not converted to metrics).
    #[serde(default)]
    pub event: Option<serde_json::Value>,
}

/// Borrowed view of the envelope's message variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnvelopeMessage<'a> {
    /// Monotonic counter.
    Counter(&'a Counter),
    /// Named gauge values.
    Gauge(&'a Gauge),
    /// Log line.
    Log,
    /// Timer.
    Timer,
    /// Event.
    Event,
    /// No recognised payload.
    Empty,
}

impl Envelope {
    /// Create a counter envelope.
    #[must_use]
    pub fn counter(name: impl Into<String>, delta: u64, total: u64) -> Self {
        Self {
            counter: Some(Counter {
                name: name.into(),
                delta,
                total,
            }),
            ..Self::default()
        }
    }

    /// Create a gauge envelope with a single value.
    #[must_use]
    pub fn gauge(name: impl Into<String>, unit: impl Into<String>, value: f64) -> Self {
        let mut metrics = BTreeMap::new();
        metrics.insert(
            name.into(),
            GaugeValue {
                unit: unit.into(),
                value,
            },
        );
        Self {
            gauge: Some(Gauge { metrics }),
            ..Self::default()
        }
    }

    /// Set the emission timestamp (nanoseconds since epoch).
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set the source identifier.
    #[must_use]
    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = source_id.into();
        self
    }

    /// Set the instance identifier.
    #[must_use]
    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = instance_id.into();
        self
    }

    /// Add a tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// The `origin` tag, or an empty string.
    #[must_use]
    pub fn origin(&self) -> &str {
        self.tags.get("origin").map_or("", String::as_str)
    }

    /// Which message variant this envelope carries.
    #[must_use]
    pub fn message(&self) -> EnvelopeMessage<'_> {
        if let Some(counter) = &self.counter {
            EnvelopeMessage::Counter(counter)
        } else if let Some(gauge) = &self.gauge {
            EnvelopeMessage::Gauge(gauge)
        } else if self.log.is_some() {
            EnvelopeMessage::Log
        } else if self.timer.is_some() {
            EnvelopeMessage::Timer
        } else if self.event.is_some() {
            EnvelopeMessage::Event
        } else {
            EnvelopeMessage::Empty
        }
    }
}

/// Counter payload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct Counter {
    /// Counter name.
    #[serde(default)]
    pub name: String,

    /// Increment since the previous emission.
    #[serde(default, deserialize_with = "int_from_string_or_number")]
    pub delta: u64,

    /// Cumulative total.
    #[serde(default, deserialize_with = "int_from_string_or_number")]
    pub total: u64,
}

/// Gauge payload: a set of named values emitted together.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Gauge {
    /// Values keyed by metric name, ordered by name.
    #[serde(default)]
    pub metrics: BTreeMap<String, GaugeValue>,
}

/// A single gauge reading.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct GaugeValue {
    /// Unit of measurement.
    #[serde(default)]
    pub unit: String,

    /// Value.
    #[serde(default)]
    pub value: f64,
}

/// Server-sent event payload carrying one batch.
///
/// # Wire Format (JSON)
/// ```json
/// {"batch": [{"counter": {...}}, null, {"gauge": {...}}]}
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvelopeBatchMessage {
    /// Envelopes in the batch; `null` entries are preserved as `None`.
    #[serde(default)]
    pub batch: EnvelopeBatch,
}

impl EnvelopeBatchMessage {
    /// Decode a batch from the JSON data of a server-sent event.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a valid envelope batch.
    pub fn decode(data: &str) -> Result<EnvelopeBatch, serde_json::Error> {
        serde_json::from_str::<Self>(data).map(|message| message.batch)
    }
}

// =============================================================================
// Serde Helpers
// =============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum IntRepr<T> {
    Number(T),
    Text(String),
}

fn int_from_string_or_number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: Display,
{
    match IntRepr::<T>::deserialize(deserializer)? {
        IntRepr::Number(value) => Ok(value),
        IntRepr::Text(text) => text.parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_counter_with_string_integers() {
        let json = r#"{
            "timestamp": "1580428783743060000",
            "source_id": "uaa",
            "instance_id": "0",
            "tags": {"origin": "uaa", "deployment": "cf"},
            "counter": {"name": "requests", "delta": "1", "total": "42"}
        }"#;

        let envelope: Envelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.timestamp, 1_580_428_783_743_060_000);
        assert_eq!(envelope.source_id, "uaa");
        assert_eq!(envelope.origin(), "uaa");

        let EnvelopeMessage::Counter(counter) = envelope.message() else {
            panic!("expected counter");
        };
        assert_eq!(counter.name, "requests");
        assert_eq!(counter.delta, 1);
        assert_eq!(counter.total, 42);
    }

    #[test]
    fn deserialize_counter_with_numeric_integers() {
        let json = r#"{"timestamp": 10, "counter": {"name": "c", "delta": 2, "total": 3}}"#;
        let envelope: Envelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.timestamp, 10);
        assert_eq!(envelope.counter.unwrap().total, 3);
    }

    #[test]
    fn deserialize_gauge() {
        let json = r#"{
            "gauge": {"metrics": {
                "memory": {"unit": "bytes", "value": 1024},
                "cpu": {"unit": "percentage", "value": 0.5}
            }}
        }"#;

        let envelope: Envelope = serde_json::from_str(json).unwrap();
        let EnvelopeMessage::Gauge(gauge) = envelope.message() else {
            panic!("expected gauge");
        };
        let names: Vec<_> = gauge.metrics.keys().cloned().collect();
        assert_eq!(names, vec!["cpu", "memory"]);
        assert!((gauge.metrics["memory"].value - 1024.0).abs() < f64::EPSILON);
    }

    #[test]
    fn log_envelope_is_recognised() {
        let json = r#"{"log": {"payload": "aGVsbG8=", "type": "OUT"}}"#;
        let envelope: Envelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.message(), EnvelopeMessage::Log);
    }

    #[test]
    fn empty_envelope() {
        let envelope: Envelope = serde_json::from_str("{}").unwrap();
        assert_eq!(envelope.message(), EnvelopeMessage::Empty);
        assert_eq!(envelope.origin(), "");
    }

    #[test]
    fn batch_preserves_null_entries() {
        let data = r#"{"batch": [{"counter": {"name": "a", "total": "1"}}, null]}"#;
        let batch = EnvelopeBatchMessage::decode(data).unwrap();
        assert_eq!(batch.len(), 2);
        assert!(batch[0].is_some());
        assert!(batch[1].is_none());
    }

    #[test]
    fn batch_missing_field_is_empty() {
        let batch = EnvelopeBatchMessage::decode("{}").unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn invalid_integer_string_is_rejected() {
        let json = r#"{"timestamp": "not-a-number"}"#;
        assert!(serde_json::from_str::<Envelope>(json).is_err());
    }

    #[test]
    fn builders_set_fields() {
        let envelope = Envelope::counter("requests", 1, 5)
            .with_timestamp(7)
            .with_source_id("app")
            .with_instance_id("2")
            .with_tag("origin", "router");

        assert_eq!(envelope.timestamp, 7);
        assert_eq!(envelope.source_id, "app");
        assert_eq!(envelope.instance_id, "2");
        assert_eq!(envelope.origin(), "router");
    }
}
