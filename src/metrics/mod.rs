//! Metric samples, sinks and output encodings.

pub mod exposition;
pub mod output;
pub mod sample;

pub use exposition::{FamilySink, PrometheusCollector, encode_text, render_text};
pub use output::{OutputFormat, RenderError, render, write_textfile};
pub use sample::{MetricKind, MetricSample, MetricSink};
