use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;

/// Type of metric.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Counter,
    Gauge,
}

/// Point-in-time value of one metric series.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct MetricsSnapshot {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<(String, String)>,
    pub value: f64,
    pub metric_type: MetricType,
}

/// In-memory counter. Monotonically increasing.
struct Counter {
    value: AtomicU64,
}

impl Counter {
    fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }
    fn increment(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }
    fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// In-memory gauge holding a signed integer.
struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    fn new() -> Self {
        Self {
            value: AtomicI64::new(0),
        }
    }
    fn set(&self, v: i64) {
        self.value.store(v, Ordering::Relaxed);
    }
    fn add(&self, delta: i64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }
    fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Metric key: name + labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
struct MetricKey {
    name: String,
    labels: Vec<(String, String)>,
}

impl MetricKey {
    fn new(name: impl Into<String>, labels: &[(&str, &str)]) -> Self {
        let mut sorted: Vec<(String, String)> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        Self {
            name: name.into(),
            labels: sorted,
        }
    }
}

/// Thread-safe in-process metrics recorder.
pub struct MetricsRecorder {
    counters: RwLock<HashMap<MetricKey, Counter>>,
    gauges: RwLock<HashMap<MetricKey, Gauge>>,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
            gauges: RwLock::new(HashMap::new()),
        }
    }

    /// Increment a counter by n.
    pub fn counter_inc(&self, name: &str, labels: &[(&str, &str)], n: u64) {
        let key = MetricKey::new(name, labels);
        let counters = self.counters.read();
        if let Some(c) = counters.get(&key) {
            c.increment(n);
            return;
        }
        drop(counters);
        let mut counters = self.counters.write();
        let c = counters.entry(key).or_insert_with(Counter::new);
        c.increment(n);
    }

    /// Set a gauge to a specific value.
    pub fn gauge_set(&self, name: &str, labels: &[(&str, &str)], value: i64) {
        let key = MetricKey::new(name, labels);
        let gauges = self.gauges.read();
        if let Some(g) = gauges.get(&key) {
            g.set(value);
            return;
        }
        drop(gauges);
        let mut gauges = self.gauges.write();
        let g = gauges.entry(key).or_insert_with(Gauge::new);
        g.set(value);
    }

    /// Increment/decrement a gauge by delta.
    pub fn gauge_add(&self, name: &str, labels: &[(&str, &str)], delta: i64) {
        let key = MetricKey::new(name, labels);
        let gauges = self.gauges.read();
        if let Some(g) = gauges.get(&key) {
            g.add(delta);
            return;
        }
        drop(gauges);
        let mut gauges = self.gauges.write();
        let g = gauges.entry(key).or_insert_with(Gauge::new);
        g.add(delta);
    }

    /// Get current value of a counter.
    pub fn counter_get(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        let key = MetricKey::new(name, labels);
        self.counters.read().get(&key).map_or(0, |c| c.get())
    }

    /// Get current value of a gauge.
    pub fn gauge_get(&self, name: &str, labels: &[(&str, &str)]) -> i64 {
        let key = MetricKey::new(name, labels);
        self.gauges.read().get(&key).map_or(0, |g| g.get())
    }

    /// All series, sorted by name then labels.
    pub fn snapshot(&self) -> Vec<MetricsSnapshot> {
        let mut out: Vec<(MetricKey, MetricsSnapshot)> = Vec::new();

        for (key, counter) in self.counters.read().iter() {
            out.push((
                key.clone(),
                MetricsSnapshot {
                    name: key.name.clone(),
                    labels: key.labels.clone(),
                    value: counter.get() as f64,
                    metric_type: MetricType::Counter,
                },
            ));
        }
        for (key, gauge) in self.gauges.read().iter() {
            out.push((
                key.clone(),
                MetricsSnapshot {
                    name: key.name.clone(),
                    labels: key.labels.clone(),
                    value: gauge.get() as f64,
                    metric_type: MetricType::Gauge,
                },
            ));
        }

        out.sort_by(|a, b| a.0.cmp(&b.0));
        out.into_iter().map(|(_, s)| s).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_increments() {
        let recorder = MetricsRecorder::new();
        recorder.counter_inc("messages_total", &[], 1);
        recorder.counter_inc("messages_total", &[], 4);
        assert_eq!(recorder.counter_get("messages_total", &[]), 5);
        assert_eq!(recorder.counter_get("unknown", &[]), 0);
    }

    #[test]
    fn labels_are_order_insensitive() {
        let recorder = MetricsRecorder::new();
        recorder.counter_inc("rejected", &[("role", "candidate"), ("kind", "not_active")], 1);
        recorder.counter_inc("rejected", &[("kind", "not_active"), ("role", "candidate")], 1);
        assert_eq!(
            recorder.counter_get("rejected", &[("role", "candidate"), ("kind", "not_active")]),
            2
        );
    }

    #[test]
    fn gauge_set_and_add() {
        let recorder = MetricsRecorder::new();
        recorder.gauge_set("connections", &[("channel", "candidate")], 3);
        recorder.gauge_add("connections", &[("channel", "candidate")], -1);
        assert_eq!(recorder.gauge_get("connections", &[("channel", "candidate")]), 2);

        recorder.gauge_add("fresh", &[], -2);
        assert_eq!(recorder.gauge_get("fresh", &[]), -2);
    }

    #[test]
    fn snapshot_is_sorted() {
        let recorder = MetricsRecorder::new();
        recorder.counter_inc("b_total", &[], 1);
        recorder.gauge_set("a_gauge", &[], 7);
        let snap = recorder.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].name, "a_gauge");
        assert_eq!(snap[0].metric_type, MetricType::Gauge);
        assert_eq!(snap[1].value, 1.0);
    }
}
