//! Loggregator Envelope Converter
//!
//! | Envelope | Metric record |
//! |----------|---------------|
//! | `counter` | one monotonic cumulative `Sum`, value = `total` |
//! | `gauge` | one `Gauge` per entry, in name order, value and unit from the entry |
//! | `log` / `timer` / `event` | none |
//!
//! Metric names are prefixed with the envelope's `origin` tag. Every data
//! point carries the envelope tags as `org.cloudfoundry.<tag>` attributes,
//! plus `org.cloudfoundry.source_id` and `org.cloudfoundry.instance_id`.

use chrono::{DateTime, Utc};
use opentelemetry_proto::tonic::common::v1::{AnyValue, KeyValue, any_value};
use opentelemetry_proto::tonic::metrics::v1::{
    AggregationTemporality, Gauge, Metric, NumberDataPoint, Sum, metric, number_data_point,
};

use crate::application::ports::EnvelopeConverter;
use crate::domain::envelope::{Envelope, EnvelopeMessage};
use crate::domain::metrics::MetricsSink;

/// Prefix applied to every attribute key derived from an envelope.
pub const ATTRIBUTE_PREFIX: &str = "org.cloudfoundry.";

/// Converter for loggregator v2 counter and gauge envelopes.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggregatorConverter;

impl EnvelopeConverter for LoggregatorConverter {
    fn convert(&self, envelope: &Envelope, sink: &mut MetricsSink<'_>, start_time: DateTime<Utc>) {
        let points = PointTemplate::new(envelope, start_time);

        match envelope.message() {
            EnvelopeMessage::Counter(counter) => {
                #[allow(clippy::cast_precision_loss)]
                let value = counter.total as f64;

                sink.push(Metric {
                    name: metric_name(envelope.origin(), &counter.name),
                    data: Some(metric::Data::Sum(Sum {
                        data_points: vec![points.point(value)],
                        aggregation_temporality: AggregationTemporality::Cumulative as i32,
                        is_monotonic: true,
                    })),
                    ..Default::default()
                });
            }
            EnvelopeMessage::Gauge(gauge) => {
                sink.extend(gauge.metrics.iter().map(|(name, reading)| Metric {
                    name: metric_name(envelope.origin(), name),
                    unit: reading.unit.clone(),
                    data: Some(metric::Data::Gauge(Gauge {
                        data_points: vec![points.point(reading.value)],
                    })),
                    ..Default::default()
                }));
            }
            EnvelopeMessage::Log
            | EnvelopeMessage::Timer
            | EnvelopeMessage::Event
            | EnvelopeMessage::Empty => {}
        }
    }
}

fn metric_name(origin: &str, name: &str) -> String {
    format!("{origin}.{name}")
}

struct PointTemplate {
    attributes: Vec<KeyValue>,
    start_time_unix_nano: u64,
    time_unix_nano: u64,
}

impl PointTemplate {
    fn new(envelope: &Envelope, start_time: DateTime<Utc>) -> Self {
        let mut attributes: Vec<KeyValue> = envelope
            .tags
            .iter()
            .map(|(key, value)| string_attribute(key, value))
            .collect();

        if !envelope.source_id.is_empty() {
            attributes.push(string_attribute("source_id", &envelope.source_id));
        }
        if !envelope.instance_id.is_empty() {
            attributes.push(string_attribute("instance_id", &envelope.instance_id));
        }

        Self {
            attributes,
            start_time_unix_nano: start_time
                .timestamp_nanos_opt()
                .and_then(|nanos| u64::try_from(nanos).ok())
                .unwrap_or_default(),
            time_unix_nano: u64::try_from(envelope.timestamp).unwrap_or_default(),
        }
    }

    fn point(&self, value: f64) -> NumberDataPoint {
        NumberDataPoint {
            attributes: self.attributes.clone(),
            start_time_unix_nano: self.start_time_unix_nano,
            time_unix_nano: self.time_unix_nano,
            value: Some(number_data_point::Value::AsDouble(value)),
            ..Default::default()
        }
    }
}

fn string_attribute(key: &str, value: &str) -> KeyValue {
    KeyValue {
        key: format!("{ATTRIBUTE_PREFIX}{key}"),
        value: Some(AnyValue {
            value: Some(any_value::Value::StringValue(value.to_string())),
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metrics::MetricsBatch;
    use chrono::TimeZone;

    fn convert(envelope: &Envelope) -> MetricsBatch {
        let start = Utc.timestamp_opt(1_000, 0).unwrap();
        let mut batch = MetricsBatch::new_cycle();
        LoggregatorConverter.convert(envelope, &mut batch.sink(), start);
        batch
    }

    fn attribute<'a>(point: &'a NumberDataPoint, key: &str) -> Option<&'a str> {
        point.attributes.iter().find(|kv| kv.key == key).and_then(|kv| {
            match kv.value.as_ref()?.value.as_ref()? {
                any_value::Value::StringValue(s) => Some(s.as_str()),
                _ => None,
            }
        })
    }

    #[test]
    fn counter_becomes_monotonic_cumulative_sum() {
        let envelope = Envelope::counter("requests", 1, 42)
            .with_timestamp(5_000_000_000)
            .with_source_id("uaa")
            .with_instance_id("0")
            .with_tag("origin", "uaa")
            .with_tag("deployment", "cf");

        let batch = convert(&envelope);
        assert_eq!(batch.metric_count(), 1);

        let metric = &batch.metrics()[0];
        assert_eq!(metric.name, "uaa.requests");
        let Some(metric::Data::Sum(sum)) = &metric.data else {
            panic!("expected sum");
        };
        assert!(sum.is_monotonic);
        assert_eq!(
            sum.aggregation_temporality,
            AggregationTemporality::Cumulative as i32
        );

        let point = &sum.data_points[0];
        assert_eq!(point.value, Some(number_data_point::Value::AsDouble(42.0)));
        assert_eq!(point.time_unix_nano, 5_000_000_000);
        assert_eq!(point.start_time_unix_nano, 1_000_000_000_000);
        assert_eq!(attribute(point, "org.cloudfoundry.origin"), Some("uaa"));
        assert_eq!(attribute(point, "org.cloudfoundry.deployment"), Some("cf"));
        assert_eq!(attribute(point, "org.cloudfoundry.source_id"), Some("uaa"));
        assert_eq!(attribute(point, "org.cloudfoundry.instance_id"), Some("0"));
    }

    #[test]
    fn gauge_entries_become_sorted_gauges() {
        let mut envelope = Envelope::gauge("memory", "bytes", 1024.0).with_tag("origin", "rep");
        if let Some(gauge) = envelope.gauge.as_mut() {
            gauge.metrics.insert(
                "cpu".to_string(),
                crate::domain::envelope::GaugeValue {
                    unit: "percentage".to_string(),
                    value: 0.5,
                },
            );
        }

        let batch = convert(&envelope);
        let names: Vec<_> = batch.metrics().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["rep.cpu", "rep.memory"]);
        assert_eq!(batch.metrics()[1].unit, "bytes");

        let Some(metric::Data::Gauge(gauge)) = &batch.metrics()[1].data else {
            panic!("expected gauge");
        };
        assert_eq!(
            gauge.data_points[0].value,
            Some(number_data_point::Value::AsDouble(1024.0))
        );
    }

    #[test]
    fn non_metric_envelopes_are_ignored() {
        let log = Envelope {
            log: Some(serde_json::json!({"payload": ""})),
            ..Envelope::default()
        };
        assert!(convert(&log).is_empty());
        assert!(convert(&Envelope::default()).is_empty());
    }

    #[test]
    fn empty_identifiers_are_omitted() {
        let batch = convert(&Envelope::counter("c", 0, 1));
        let Some(metric::Data::Sum(sum)) = &batch.metrics()[0].data else {
            panic!("expected sum");
        };
        assert!(sum.data_points[0].attributes.is_empty());
        assert_eq!(batch.metrics()[0].name, ".c");
    }

    #[test]
    fn negative_timestamp_clamps_to_zero() {
        let batch = convert(&Envelope::counter("c", 0, 1).with_timestamp(-1));
        assert_eq!(batch.data_point_count(), 1);
        let Some(metric::Data::Sum(sum)) = &batch.metrics()[0].data else {
            panic!("expected sum");
        };
        assert_eq!(sum.data_points[0].time_unix_nano, 0);
    }
}
