//! Collection pass combining discovery, supervision and status parsing.
//!
//! The `ServiceCollector` turns the current state of every supervised
//! service into gauge samples. It keeps no state between passes.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::collector::error::CollectError;
use crate::collector::procfs::{KNOWN_METRICS, KnownMetricSpec, ProcessStatusSnapshot, StatusReader};
use crate::collector::runit::{RunitSupervisor, Service, ServiceDiscovery, ServiceLabels, Supervisor};
use crate::collector::traits::FileSystem;
use crate::config::ExporterConfig;
use crate::metrics::{MetricSample, MetricSink};

/// Bookkeeping for one collection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Services found by discovery.
    pub services: usize,
    /// Services that contributed no samples because of an error.
    pub failed: usize,
    /// Samples written to the sink.
    pub samples: usize,
    /// Wall time of the pass.
    pub elapsed: Duration,
}

/// Result of collecting one service.
#[derive(Debug)]
pub struct ServiceOutcome {
    pub service: Service,
    pub labels: ServiceLabels,
    pub result: Result<ProcessStatusSnapshot, CollectError>,
}

/// Collects status metrics for every supervised service.
pub struct ServiceCollector<F: FileSystem + Clone, S: Supervisor = RunitSupervisor<F>> {
    discovery: ServiceDiscovery<F>,
    supervisor: S,
    status_reader: StatusReader<F>,
    specs: &'static [KnownMetricSpec],
}

impl<F: FileSystem + Clone> ServiceCollector<F> {
    /// Creates a collector querying runit's on-disk state.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `config` - Service roots, proc path and runit file names
    pub fn new(fs: F, config: &ExporterConfig) -> Self {
        let supervisor = RunitSupervisor::new(fs.clone(), config);
        Self::with_supervisor(fs, config, supervisor)
    }
}

impl<F: FileSystem + Clone, S: Supervisor> ServiceCollector<F, S> {
    /// Creates a collector with a custom supervisor.
    pub fn with_supervisor(fs: F, config: &ExporterConfig, supervisor: S) -> Self {
        Self {
            discovery: ServiceDiscovery::new(
                fs.clone(),
                config.roots.clone(),
                config.supervise_dir.clone(),
            ),
            supervisor,
            status_reader: StatusReader::new(fs, config.proc_path.clone(), &KNOWN_METRICS),
            specs: &KNOWN_METRICS,
        }
    }

    /// Metric table used for emission.
    pub fn specs(&self) -> &'static [KnownMetricSpec] {
        self.specs
    }

    /// Resolves labels and the status snapshot of one service.
    pub fn collect_service(&self, service: Service) -> ServiceOutcome {
        let labels = ServiceLabels::new(&service, &self.supervisor.channel_id(&service));
        let result = self
            .supervisor
            .live_pid(&service)
            .and_then(|pid| self.status_reader.snapshot(pid));

        ServiceOutcome {
            service,
            labels,
            result,
        }
    }

    /// Runs one collection pass, writing samples to `sink`.
    ///
    /// Fails only if no service root could be walked. Services that fail are
    /// logged and contribute no samples.
    pub fn collect_into(&self, sink: &mut dyn MetricSink) -> Result<PassSummary, CollectError> {
        let start = Instant::now();
        let services = self.discovery.discover()?;

        let mut summary = PassSummary {
            services: services.len(),
            ..Default::default()
        };

        let outcomes: Vec<ServiceOutcome> = services
            .into_iter()
            .map(|service| self.collect_service(service))
            .collect();

        for outcome in outcomes {
            match outcome.result {
                Ok(snapshot) => {
                    summary.samples += self.emit(&outcome.labels, &snapshot, sink);
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(
                        "Failed to get metrics for service {} ({}): {}",
                        outcome.service.name, outcome.service, e
                    );
                }
            }
        }

        summary.elapsed = start.elapsed();
        debug!(
            "Pass finished: {} services, {} failed, {} samples in {:?}",
            summary.services, summary.failed, summary.samples, summary.elapsed
        );
        Ok(summary)
    }

    /// Runs one collection pass and returns the samples.
    pub fn collect(&self) -> Result<(Vec<MetricSample>, PassSummary), CollectError> {
        let mut samples = Vec::new();
        let summary = self.collect_into(&mut samples)?;
        Ok((samples, summary))
    }

    fn emit(
        &self,
        labels: &ServiceLabels,
        snapshot: &ProcessStatusSnapshot,
        sink: &mut dyn MetricSink,
    ) -> usize {
        let keys = labels.keys();
        let values = labels.values();
        let mut emitted = 0;

        for spec in self.specs {
            if let Some(value) = snapshot.get(spec.metric_name) {
                sink.submit(MetricSample::gauge(
                    spec.metric_name,
                    spec.description,
                    keys.clone(),
                    values.clone(),
                    value as f64,
                ));
                emitted += 1;
            }
        }

        emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;
    use crate::collector::runit::SvStatus;
    use std::path::PathBuf;

    fn config(roots: &[&str]) -> ExporterConfig {
        ExporterConfig::default().with_roots(roots.iter().map(PathBuf::from).collect())
    }

    fn samples_for<'a>(samples: &'a [MetricSample], service: &str) -> Vec<&'a MetricSample> {
        samples
            .iter()
            .filter(|s| s.label("service") == Some(service))
            .collect()
    }

    fn value(samples: &[MetricSample], service: &str, name: &str) -> Option<f64> {
        samples_for(samples, service)
            .into_iter()
            .find(|s| s.name == name)
            .map(|s| s.value)
    }

    #[test]
    fn test_typical_services() {
        let fs = MockFs::typical_services();
        let collector = ServiceCollector::new(fs, &config(&["/service/", "/tmp/service/"]));

        let (samples, summary) = collector.collect().unwrap();

        // encoder, web and web/log are discovered; the log service is down.
        assert_eq!(summary.services, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.samples, 8);
        assert_eq!(samples.len(), 8);

        assert_eq!(
            value(&samples, "encoder", "service_mem_vmrss"),
            Some(2048.0 * 1024.0)
        );
        assert_eq!(value(&samples, "encoder", "service_threads"), Some(4.0));
        assert_eq!(value(&samples, "web", "service_threads"), Some(1.0));
        assert_eq!(
            value(&samples, "web", "service_nonvoluntary_ctxt_switches"),
            Some(17.0)
        );
        assert!(samples_for(&samples, "log").is_empty());
    }

    #[test]
    fn test_labels_include_channel_id() {
        let fs = MockFs::typical_services();
        let collector = ServiceCollector::new(fs, &config(&["/service/"]));
        let (samples, _) = collector.collect().unwrap();

        for sample in samples_for(&samples, "encoder") {
            assert_eq!(sample.label_keys, vec!["service", "channel_id"]);
            assert_eq!(sample.label_values, vec!["encoder", "3"]);
        }
        for sample in samples_for(&samples, "web") {
            assert_eq!(sample.label_keys, vec!["service"]);
        }
    }

    #[test]
    fn test_absent_fields_are_not_emitted() {
        let mut fs = MockFs::new();
        fs.add_running_service("/service", "svc", 10);
        fs.add_process_status(10, "Name:\tsvc\nThreads:\t2\n");

        let collector = ServiceCollector::new(fs, &config(&["/service"]));
        let (samples, _) = collector.collect().unwrap();

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].name, "service_threads");
        assert_eq!(samples[0].description, "Number of threads");
    }

    #[test]
    fn test_malformed_record_skips_service() {
        let mut fs = MockFs::typical_services();
        fs.add_process_status(1200, "VmRSS:\tmany kB\nThreads:\t4\n");

        let collector = ServiceCollector::new(fs, &config(&["/service/"]));
        let (samples, summary) = collector.collect().unwrap();

        assert_eq!(summary.failed, 2);
        assert!(samples_for(&samples, "encoder").is_empty());
        assert_eq!(samples_for(&samples, "web").len(), 4);
    }

    #[test]
    fn test_process_gone_skips_service() {
        let mut fs = MockFs::typical_services();
        fs.remove_file("/proc/1300/status");

        let collector = ServiceCollector::new(fs, &config(&["/service/"]));
        let outcome = collector.collect_service(Service::new("web", "/service/"));
        assert!(matches!(
            outcome.result,
            Err(CollectError::SourceUnavailable { pid: 1300, .. })
        ));

        let (samples, _) = collector.collect().unwrap();
        assert!(samples_for(&samples, "web").is_empty());
        assert_eq!(samples_for(&samples, "encoder").len(), 4);
    }

    #[test]
    fn test_non_utf8_process_name_is_collected() {
        let mut fs = MockFs::new();
        fs.add_running_service("/service", "svc", 10);
        let mut status = b"Name:\t".to_vec();
        status.extend_from_slice(&"сервис-э".as_bytes()[..14]);
        status.extend_from_slice(b"\nVmRSS:\t  2048 kB\nThreads:\t4\n");
        fs.add_file("/proc/10/status", status);

        let collector = ServiceCollector::new(fs, &config(&["/service"]));
        let (samples, summary) = collector.collect().unwrap();

        assert_eq!(summary.failed, 0);
        assert_eq!(samples.len(), 2);
        assert_eq!(value(&samples, "svc", "service_mem_vmrss"), Some(2048.0 * 1024.0));
    }

    #[test]
    fn test_orphaned_status_is_not_trusted() {
        let mut fs = MockFs::typical_services();
        // runsv of web is gone and pid 1300 now belongs to something else.
        fs.add_fifo("/service/web/supervise/ok", false);

        let collector = ServiceCollector::new(fs, &config(&["/service/"]));
        let outcome = collector.collect_service(Service::new("web", "/service/"));
        assert!(matches!(
            outcome.result,
            Err(CollectError::SupervisionUnavailable { .. })
        ));

        let (samples, summary) = collector.collect().unwrap();
        assert_eq!(summary.failed, 2);
        assert!(samples_for(&samples, "web").is_empty());
        assert_eq!(samples_for(&samples, "encoder").len(), 4);
    }

    #[test]
    fn test_unreadable_root_with_two_valid_services() {
        let mut fs = MockFs::typical_services();
        fs.add_dir("/tmp/service/hidden/supervise");
        fs.deny("/tmp/service");

        let collector = ServiceCollector::new(fs, &config(&["/tmp/service/", "/service/"]));
        let (samples, _) = collector.collect().unwrap();

        let mut services: Vec<&str> = samples.iter().filter_map(|s| s.label("service")).collect();
        services.dedup();
        assert_eq!(services, vec!["encoder", "web"]);
    }

    #[test]
    fn test_no_walkable_root_fails_the_pass() {
        let collector = ServiceCollector::new(MockFs::new(), &config(&["/service/"]));
        assert!(matches!(
            collector.collect(),
            Err(CollectError::NoServiceRoots(_))
        ));
    }

    #[test]
    fn test_passes_are_idempotent() {
        let collector = ServiceCollector::new(MockFs::typical_services(), &config(&["/service/"]));

        let (first, _) = collector.collect().unwrap();
        let (second, _) = collector.collect().unwrap();
        assert_eq!(first, second);
    }

    struct FixedSupervisor(u32);

    impl Supervisor for FixedSupervisor {
        fn status(&self, _service: &Service) -> Result<SvStatus, CollectError> {
            Ok(SvStatus::running(self.0, chrono::Utc::now()))
        }

        fn channel_id(&self, _service: &Service) -> String {
            "fixed".to_string()
        }
    }

    #[test]
    fn test_custom_supervisor() {
        let mut fs = MockFs::new();
        fs.add_dir("/service/a.b/supervise");
        fs.add_process_status(99, "Threads:\t8\n");

        let collector =
            ServiceCollector::with_supervisor(fs, &config(&["/service"]), FixedSupervisor(99));
        let (samples, _) = collector.collect().unwrap();

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].label("service"), Some("b"));
        assert_eq!(samples[0].label("channel_id"), Some("fixed"));
        assert_eq!(samples[0].value, 8.0);
    }
}
