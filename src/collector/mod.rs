//! Service metrics collector for runit-supervised processes.
//!
//! This module discovers runit services, asks the supervisor for the pid of
//! each one and extracts memory, thread and scheduling counters from
//! `/proc/[pid]/status`, with support for mocking in tests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ServiceCollector                       │
//! │  ┌──────────────────┐ ┌─────────────────┐ ┌──────────────┐  │
//! │  │ ServiceDiscovery │ │ RunitSupervisor │ │ StatusReader │  │
//! │  │ - /service/**    │ │ - supervise/    │ │ - /proc/[pid]│  │
//! │  │                  │ │   status        │ │   /status    │  │
//! │  └────────┬─────────┘ └────────┬────────┘ └──────┬───────┘  │
//! │           └────────────────────┼─────────────────┘          │
//! │                         ┌──────▼──────┐                     │
//! │                         │  FileSystem │ (trait)             │
//! │                         └──────┬──────┘                     │
//! └────────────────────────────────┼────────────────────────────┘
//!                                  │
//!                       ┌──────────┴──────────┐
//!                ┌──────▼──────┐       ┌──────▼──────┐
//!                │   RealFs    │       │   MockFs    │
//!                └─────────────┘       └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use runit_exporter::collector::{MockFs, ServiceCollector};
//! use runit_exporter::config::ExporterConfig;
//!
//! let fs = MockFs::typical_services();
//! let collector = ServiceCollector::new(fs, &ExporterConfig::default());
//! let (samples, summary) = collector.collect().unwrap();
//! assert_eq!(summary.services, 3);
//! assert!(!samples.is_empty());
//! ```

#[allow(clippy::module_inception)]
mod collector;
mod error;
pub mod mock;
pub mod procfs;
pub mod runit;
pub mod traits;

pub use collector::{PassSummary, ServiceCollector, ServiceOutcome};
pub use error::CollectError;
pub use mock::MockFs;
pub use traits::{FileKind, FileSystem, RealFs};
