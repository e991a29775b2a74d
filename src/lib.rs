//! runit-exporter - status metrics for runit-supervised services.
//!
//! This library provides:
//! - `collector` - service discovery, supervision queries and `/proc` parsing
//! - `metrics` - samples, sinks and Prometheus/JSON output
//! - `config` - collector settings
//!
//! The `runit-exporter` binary runs collection passes on an interval.

pub mod collector;
pub mod config;
pub mod metrics;
