//! The capability interface implemented by every metric type.

use std::fmt;

use serde::Serialize;

use crate::metadata::MetaData;
use crate::tags::{TagMap, TagSet};
use crate::Error;

/// How a series is interpreted by the time-series database.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    /// A monotonically increasing value.
    Counter,
    /// A point-in-time value that can go up or down.
    Gauge,
    /// A value that is already a rate.
    Rate,
}

impl MetricType {
    /// The name used in `rate` metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
            MetricType::Rate => "rate",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The numeric value of a single sample.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SampleValue {
    /// A signed integer value.
    Int(i64),
    /// An unsigned integer value.
    UInt(u64),
    /// A floating-point value.
    Float(f64),
}

impl SampleValue {
    fn is_finite(&self) -> bool {
        match self {
            SampleValue::Float(v) => v.is_finite(),
            _ => true,
        }
    }
}

impl From<i64> for SampleValue {
    fn from(v: i64) -> Self {
        SampleValue::Int(v)
    }
}

impl From<u64> for SampleValue {
    fn from(v: u64) -> Self {
        SampleValue::UInt(v)
    }
}

impl From<usize> for SampleValue {
    fn from(v: usize) -> Self {
        SampleValue::UInt(v as u64)
    }
}

impl From<f64> for SampleValue {
    fn from(v: f64) -> Self {
        SampleValue::Float(v)
    }
}

#[derive(Serialize)]
struct Sample<'a> {
    metric: &'a str,
    value: SampleValue,
    tags: &'a TagMap,
    timestamp: u64,
}

/// Collects the serialized samples of one metric instance during a snapshot.
pub struct SampleWriter<'a> {
    name: &'a str,
    tags: &'a TagSet,
    suffixes: &'a [&'static str],
    timestamp: u64,
    out: &'a mut Vec<String>,
}

impl<'a> SampleWriter<'a> {
    pub(crate) fn new(
        name: &'a str,
        tags: &'a TagSet,
        suffixes: &'a [&'static str],
        timestamp: u64,
        out: &'a mut Vec<String>,
    ) -> Self {
        Self {
            name,
            tags,
            suffixes,
            timestamp,
            out,
        }
    }

    /// The unix timestamp (seconds) shared by all samples of this snapshot.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Writes one sample for the series `<name><suffix>`.
    ///
    /// The suffix must be one of [`BosunMetric::suffixes`] and the value must be
    /// finite.
    pub fn write(&mut self, suffix: &str, value: impl Into<SampleValue>) -> Result<(), Error> {
        let value = value.into();
        let metric = format!("{}{}", self.name, suffix);
        if !self.suffixes.contains(&suffix) {
            return Err(Error::InvalidSample {
                name: metric,
                reason: "suffix was not declared by the metric type",
            });
        }
        if !value.is_finite() {
            return Err(Error::InvalidSample {
                name: metric,
                reason: "value is not finite",
            });
        }

        let sample = Sample {
            metric: &metric,
            value,
            tags: self.tags.as_map(),
            timestamp: self.timestamp,
        };
        self.out.push(serde_json::to_string(&sample)?);
        Ok(())
    }
}

/// A metric type that can be registered with a [`MetricsReporter`](crate::MetricsReporter).
///
/// Implementations hold the recorded value (usually in atomics) and write it
/// out as samples whenever a snapshot is taken. Everything else (naming,
/// tagging, queueing, delivery) is handled by the reporter.
///
/// # Example
///
/// ```
/// use std::sync::atomic::{AtomicU64, Ordering};
/// use bosun_metrics::{BosunMetric, Error, MetricType, SampleWriter};
///
/// #[derive(Default)]
/// struct Connections(AtomicU64);
///
/// impl BosunMetric for Connections {
///     fn metric_type(&self) -> MetricType {
///         MetricType::Gauge
///     }
///
///     fn serialize(&self, writer: &mut SampleWriter<'_>) -> Result<(), Error> {
///         writer.write("", self.0.load(Ordering::Relaxed))
///     }
/// }
/// ```
pub trait BosunMetric: Send + Sync + 'static {
    /// The suffixes appended to the root name, one per emitted series.
    ///
    /// The empty suffix denotes the root name itself. Resolved once at
    /// registration.
    fn suffixes() -> &'static [&'static str]
    where
        Self: Sized,
    {
        &[""]
    }

    /// Whether the configured default tags apply to this type.
    fn include_default_tags() -> bool
    where
        Self: Sized,
    {
        true
    }

    /// The type of the emitted series.
    fn metric_type(&self) -> MetricType;

    /// A human readable description sent as `desc` metadata.
    fn description(&self) -> Option<&str> {
        None
    }

    /// The unit of the series with the given suffix, sent as `unit` metadata.
    fn unit(&self, _suffix: &str) -> Option<&str> {
        None
    }

    /// Writes the current value(s) as samples.
    fn serialize(&self, writer: &mut SampleWriter<'_>) -> Result<(), Error>;

    /// The metadata descriptors for the metric registered under `name`.
    fn metadata(&self, name: &str, suffixes: &[&'static str]) -> Vec<MetaData> {
        let mut rv = Vec::new();
        for suffix in suffixes {
            let metric = format!("{name}{suffix}");
            rv.push(MetaData::new(&metric, "rate", self.metric_type().as_str()));
            if let Some(desc) = self.description() {
                rv.push(MetaData::new(&metric, "desc", desc));
            }
            if let Some(unit) = self.unit(suffix) {
                rv.push(MetaData::new(&metric, "unit", unit));
            }
        }
        rv
    }
}
