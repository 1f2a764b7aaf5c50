//! Built-in metric types.
//!
//! Each type records values without locking out concurrent recorders and
//! writes them as samples when a snapshot is taken:
//!
//!  - [`Counter`] tracks a cumulative count that only goes up.
//!  - [`SamplingGauge`] reports the last recorded value.
//!  - [`AggregateGauge`] reports the average, minimum, maximum and count of
//!    all values recorded since the previous snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::metric::{BosunMetric, MetricType, SampleWriter};
use crate::Error;

/// A cumulative counter.
///
/// ```
/// use bosun_metrics::metrics::Counter;
///
/// let counter = Counter::new();
/// counter.increment();
/// counter.increment_by(2);
/// assert_eq!(counter.value(), 3);
/// ```
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    /// Creates a counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the counter by one.
    pub fn increment(&self) {
        self.increment_by(1);
    }

    /// Increments the counter by `amount`.
    pub fn increment_by(&self, amount: u64) {
        self.value.fetch_add(amount, Ordering::Relaxed);
    }

    /// The current count.
    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl BosunMetric for Counter {
    fn metric_type(&self) -> MetricType {
        MetricType::Counter
    }

    fn serialize(&self, writer: &mut SampleWriter<'_>) -> Result<(), Error> {
        writer.write("", self.value())
    }
}

/// A gauge that reports the most recently recorded value.
///
/// Recording `f64::NAN` disables the gauge until the next real value, and a
/// new gauge starts out disabled.
#[derive(Debug)]
pub struct SamplingGauge {
    bits: AtomicU64,
}

impl SamplingGauge {
    /// Creates a gauge without a value.
    pub fn new() -> Self {
        Self {
            bits: AtomicU64::new(f64::NAN.to_bits()),
        }
    }

    /// Records the current value.
    pub fn record(&self, value: f64) {
        self.bits.swap(value.to_bits(), Ordering::Relaxed);
    }

    /// The current value, `NAN` if disabled.
    pub fn current_value(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

impl Default for SamplingGauge {
    fn default() -> Self {
        Self::new()
    }
}

impl BosunMetric for SamplingGauge {
    fn metric_type(&self) -> MetricType {
        MetricType::Gauge
    }

    fn serialize(&self, writer: &mut SampleWriter<'_>) -> Result<(), Error> {
        let value = self.current_value();
        if value.is_nan() {
            return Ok(());
        }
        writer.write("", value)
    }
}

/// A snapshot of values.
#[derive(Clone, Copy, Debug, PartialEq)]
struct GaugeSummary {
    min: f64,
    max: f64,
    sum: f64,
    count: u64,
}

impl GaugeSummary {
    fn single(value: f64) -> Self {
        Self {
            min: value,
            max: value,
            sum: value,
            count: 1,
        }
    }

    fn insert(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;
        self.count += 1;
    }
}

/// A gauge that aggregates all values recorded between two snapshots.
///
/// Emits the series `.avg`, `.min`, `.max` and `.count`. The window is reset
/// after every snapshot; if nothing was recorded no samples are written.
#[derive(Debug, Default)]
pub struct AggregateGauge {
    window: Mutex<Option<GaugeSummary>>,
}

impl AggregateGauge {
    /// Creates an empty aggregate gauge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a value into the current window. Non-finite values are ignored.
    pub fn record(&self, value: f64) {
        if !value.is_finite() {
            return;
        }
        let mut window = self.window.lock().unwrap();
        match *window {
            Some(ref mut summary) => summary.insert(value),
            None => *window = Some(GaugeSummary::single(value)),
        }
    }
}

impl BosunMetric for AggregateGauge {
    fn suffixes() -> &'static [&'static str] {
        &[".avg", ".min", ".max", ".count"]
    }

    fn metric_type(&self) -> MetricType {
        MetricType::Gauge
    }

    fn serialize(&self, writer: &mut SampleWriter<'_>) -> Result<(), Error> {
        let Some(summary) = self.window.lock().unwrap().take() else {
            return Ok(());
        };
        writer.write(".avg", summary.sum / summary.count as f64)?;
        writer.write(".min", summary.min)?;
        writer.write(".max", summary.max)?;
        writer.write(".count", summary.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::{TagMap, TagResolver, TagSet, Tags};

    fn serialize<M: BosunMetric>(metric: &M) -> Vec<String> {
        let tags: TagSet = TagResolver::new(None, None, &TagMap::new())
            .unwrap()
            .resolve(&Tags::new(), true)
            .unwrap();
        let mut out = Vec::new();
        let mut writer = SampleWriter::new("m", &tags, M::suffixes(), 10, &mut out);
        metric.serialize(&mut writer).unwrap();
        out
    }

    #[test]
    fn test_counter() {
        let counter = Counter::new();
        counter.increment();
        counter.increment_by(4);
        assert_eq!(
            serialize(&counter),
            vec![r#"{"metric":"m","value":5,"tags":{},"timestamp":10}"#]
        );
        // counters are cumulative
        assert_eq!(serialize(&counter).len(), 1);
    }

    #[test]
    fn test_sampling_gauge() {
        let gauge = SamplingGauge::new();
        assert!(serialize(&gauge).is_empty());

        gauge.record(2.5);
        assert_eq!(
            serialize(&gauge),
            vec![r#"{"metric":"m","value":2.5,"tags":{},"timestamp":10}"#]
        );

        gauge.record(f64::NAN);
        assert!(serialize(&gauge).is_empty());
    }

    #[test]
    fn test_aggregate_gauge() {
        let gauge = AggregateGauge::new();
        assert!(serialize(&gauge).is_empty());

        gauge.record(2.0);
        gauge.record(1.0);
        gauge.record(f64::INFINITY);
        gauge.record(6.0);
        assert_eq!(
            serialize(&gauge),
            vec![
                r#"{"metric":"m.avg","value":3.0,"tags":{},"timestamp":10}"#,
                r#"{"metric":"m.min","value":1.0,"tags":{},"timestamp":10}"#,
                r#"{"metric":"m.max","value":6.0,"tags":{},"timestamp":10}"#,
                r#"{"metric":"m.count","value":3,"tags":{},"timestamp":10}"#,
            ]
        );
        assert!(serialize(&gauge).is_empty());
    }
}
