//! Metric samples and the sink they are written to.

use serde::Serialize;

/// Kind of an emitted metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Gauge,
}

/// One labeled value produced by a collection pass.
///
/// `label_keys[i]` names `label_values[i]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    pub name: String,
    pub description: String,
    pub label_keys: Vec<String>,
    pub label_values: Vec<String>,
    pub value: f64,
    pub kind: MetricKind,
}

impl MetricSample {
    pub fn gauge(
        name: impl Into<String>,
        description: impl Into<String>,
        label_keys: Vec<String>,
        label_values: Vec<String>,
        value: f64,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            label_keys,
            label_values,
            value,
            kind: MetricKind::Gauge,
        }
    }

    /// Returns the value of label `key`, if present.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.label_keys
            .iter()
            .position(|k| k == key)
            .and_then(|i| self.label_values.get(i))
            .map(String::as_str)
    }
}

/// Destination of samples produced by a collection pass.
pub trait MetricSink {
    fn submit(&mut self, sample: MetricSample);
}

impl MetricSink for Vec<MetricSample> {
    fn submit(&mut self, sample: MetricSample) {
        self.push(sample);
    }
}
