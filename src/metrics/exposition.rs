//! Prometheus exposition of collected samples.
//!
//! Samples of one metric may carry different label sets (only some services
//! have a `channel_id`), so families are assembled directly from protobuf
//! messages instead of through `GaugeVec`, which fixes label names up front.

use std::collections::{BTreeMap, HashMap};

use prometheus::core::{Collector, Desc};
use prometheus::proto::{Gauge, LabelPair, Metric, MetricFamily, MetricType};
use prometheus::{Encoder, TextEncoder};
use tracing::warn;

use crate::collector::runit::{ServiceLabels, Supervisor};
use crate::collector::{FileSystem, ServiceCollector};
use crate::metrics::sample::{MetricKind, MetricSample, MetricSink};

/// Sink grouping samples into Prometheus metric families by name.
#[derive(Debug, Default)]
pub struct FamilySink {
    families: BTreeMap<String, MetricFamily>,
}

impl FamilySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Families sorted by metric name.
    pub fn into_families(self) -> Vec<MetricFamily> {
        self.families.into_values().collect()
    }
}

impl MetricSink for FamilySink {
    fn submit(&mut self, sample: MetricSample) {
        let family = self.families.entry(sample.name.clone()).or_insert_with(|| {
            let mut family = MetricFamily::default();
            family.set_name(sample.name.clone());
            family.set_help(sample.description.clone());
            family.set_field_type(match sample.kind {
                MetricKind::Gauge => MetricType::GAUGE,
            });
            family
        });

        let mut metric = Metric::default();
        for (key, value) in sample.label_keys.iter().zip(sample.label_values.iter()) {
            let mut pair = LabelPair::default();
            pair.set_name(key.clone());
            pair.set_value(value.clone());
            metric.mut_label().push(pair);
        }
        let mut gauge = Gauge::default();
        gauge.set_value(sample.value);
        metric.set_gauge(gauge);

        family.mut_metric().push(metric);
    }
}

/// Encodes families in the Prometheus text exposition format.
pub fn encode_text(families: &[MetricFamily]) -> prometheus::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Renders samples in the Prometheus text exposition format.
pub fn render_text(samples: &[MetricSample]) -> prometheus::Result<String> {
    let mut sink = FamilySink::new();
    for sample in samples {
        sink.submit(sample.clone());
    }
    encode_text(&sink.into_families())
}

/// Adapter registering a [`ServiceCollector`] in a `prometheus::Registry`.
///
/// Every `Registry::gather()` runs one collection pass. Each desc declares
/// both `service` and `channel_id`; samples of services without a
/// `channel_id` simply omit that label.
pub struct PrometheusCollector<F: FileSystem + Clone, S: Supervisor> {
    inner: ServiceCollector<F, S>,
    descs: Vec<Desc>,
}

impl<F: FileSystem + Clone, S: Supervisor> PrometheusCollector<F, S> {
    pub fn new(inner: ServiceCollector<F, S>) -> prometheus::Result<Self> {
        let mut descs = Vec::new();
        for spec in inner.specs() {
            descs.push(Desc::new(
                spec.metric_name.to_string(),
                spec.description.to_string(),
                vec![
                    ServiceLabels::SERVICE.to_string(),
                    ServiceLabels::CHANNEL_ID.to_string(),
                ],
                HashMap::new(),
            )?);
        }
        Ok(Self { inner, descs })
    }
}

impl<F, S> Collector for PrometheusCollector<F, S>
where
    F: FileSystem + Clone + 'static,
    S: Supervisor + 'static,
{
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let mut sink = FamilySink::new();
        match self.inner.collect_into(&mut sink) {
            Ok(_) => sink.into_families(),
            Err(e) => {
                warn!("Collection pass failed: {}", e);
                Vec::new()
            }
        }
    }
}
