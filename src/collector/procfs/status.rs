//! Parser for `/proc/[pid]/status` records.
//!
//! Only the fields listed in [`KNOWN_METRICS`] are extracted. The format is
//! `Key:\tvalue [unit]` lines, one per field.

use crate::collector::error::CollectError;
use crate::collector::traits::FileSystem;
use std::collections::HashMap;
use std::path::PathBuf;

/// Describes one exportable field of the status record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownMetricSpec {
    /// Prefix the status line must start with, byte for byte.
    pub status_key: &'static str,
    pub metric_name: &'static str,
    pub description: &'static str,
    /// Number of whitespace-separated tokens after the key token.
    pub expected_field_count: usize,
    /// Factor applied to the parsed value (e.g. kB -> bytes).
    pub multiplier: i64,
}

/// Fields exported for every supervised service.
pub static KNOWN_METRICS: [KnownMetricSpec; 4] = [
    KnownMetricSpec {
        status_key: "VmRSS",
        metric_name: "service_mem_vmrss",
        description: "Virtual memory resident set size in bytes",
        expected_field_count: 2,
        multiplier: 1024,
    },
    KnownMetricSpec {
        status_key: "Threads",
        metric_name: "service_threads",
        description: "Number of threads",
        expected_field_count: 1,
        multiplier: 1,
    },
    KnownMetricSpec {
        status_key: "voluntary_ctxt_switches",
        metric_name: "service_voluntary_ctxt_switches",
        description: "Number of voluntary context switches",
        expected_field_count: 1,
        multiplier: 1,
    },
    KnownMetricSpec {
        status_key: "nonvoluntary_ctxt_switches",
        metric_name: "service_nonvoluntary_ctxt_switches",
        description: "Number of nonvoluntary context switches",
        expected_field_count: 1,
        multiplier: 1,
    },
];

/// Values extracted from one status record, keyed by metric name.
///
/// Fields missing from the record are missing here too; nothing is zero-filled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessStatusSnapshot {
    values: HashMap<&'static str, i64>,
}

impl ProcessStatusSnapshot {
    pub fn get(&self, metric_name: &str) -> Option<i64> {
        self.values.get(metric_name).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn insert(&mut self, metric_name: &'static str, value: i64) {
        self.values.insert(metric_name, value);
    }
}

/// Parses status record content against a metric table.
///
/// Every table entry whose key prefixes a line is applied to that line. A matched
/// line with the wrong number of tokens or a non-numeric value fails the whole
/// record; no partial snapshot is returned.
pub fn parse_status_record(
    content: &str,
    specs: &[KnownMetricSpec],
) -> Result<ProcessStatusSnapshot, CollectError> {
    let mut snapshot = ProcessStatusSnapshot::default();

    for line in content.lines() {
        for spec in specs {
            if !line.starts_with(spec.status_key) {
                continue;
            }

            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() != spec.expected_field_count + 1 {
                return Err(malformed(
                    spec,
                    line,
                    format!(
                        "expected {} fields, got {}",
                        spec.expected_field_count + 1,
                        parts.len()
                    ),
                ));
            }

            let value: i64 = parts[1]
                .parse()
                .map_err(|_| malformed(spec, line, format!("invalid value '{}'", parts[1])))?;
            let value = value
                .checked_mul(spec.multiplier)
                .ok_or_else(|| malformed(spec, line, "value overflows after scaling"))?;

            snapshot.insert(spec.metric_name, value);
        }
    }

    Ok(snapshot)
}

fn malformed(spec: &KnownMetricSpec, line: &str, reason: impl Into<String>) -> CollectError {
    CollectError::MalformedRecord {
        key: spec.status_key,
        line: line.to_string(),
        reason: reason.into(),
    }
}

/// Reads and parses `/proc/[pid]/status` through a [`FileSystem`].
pub struct StatusReader<F: FileSystem> {
    fs: F,
    proc_path: PathBuf,
    specs: &'static [KnownMetricSpec],
}

impl<F: FileSystem> StatusReader<F> {
    /// Creates a new reader.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    pub fn new(fs: F, proc_path: impl Into<PathBuf>, specs: &'static [KnownMetricSpec]) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
            specs,
        }
    }

    pub fn status_path(&self, pid: u32) -> PathBuf {
        self.proc_path.join(pid.to_string()).join("status")
    }

    /// Loads the status record of `pid` and extracts the known fields.
    ///
    /// `Name:` carries the raw, truncated command name, so the record is not
    /// guaranteed to be UTF-8 and is decoded lossily.
    pub fn snapshot(&self, pid: u32) -> Result<ProcessStatusSnapshot, CollectError> {
        let path = self.status_path(pid);
        let bytes = self
            .fs
            .read(&path)
            .map_err(|source| CollectError::SourceUnavailable { pid, source })?;
        parse_status_record(&String::from_utf8_lossy(&bytes), self.specs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;
    use crate::collector::traits::RealFs;

    const NGINX_STATUS: &str = "\
Name:\tnginx
Umask:\t0022
State:\tS (sleeping)
Tgid:\t812
Pid:\t812
PPid:\t640
VmPeak:\t   14212 kB
VmSize:\t   14180 kB
VmHWM:\t    6120 kB
VmRSS:\t    5872 kB
RssAnon:\t     880 kB
Threads:\t1
SigQ:\t0/15439
voluntary_ctxt_switches:\t1402
nonvoluntary_ctxt_switches:\t17
";

    fn assert_malformed(result: Result<ProcessStatusSnapshot, CollectError>, expected_key: &str) {
        match result {
            Err(CollectError::MalformedRecord { key, .. }) => assert_eq!(key, expected_key),
            other => panic!("expected MalformedRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_known_metrics_table() {
        let names: Vec<&str> = KNOWN_METRICS.iter().map(|m| m.metric_name).collect();
        assert_eq!(
            names,
            vec![
                "service_mem_vmrss",
                "service_threads",
                "service_voluntary_ctxt_switches",
                "service_nonvoluntary_ctxt_switches",
            ]
        );
        assert_eq!(KNOWN_METRICS[0].multiplier, 1024);
        assert_eq!(KNOWN_METRICS[0].expected_field_count, 2);
    }

    #[test]
    fn test_parse_vmrss_and_threads() {
        let snapshot =
            parse_status_record("VmRSS:\t  2048 kB\nThreads:\t4\n", &KNOWN_METRICS).unwrap();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("service_mem_vmrss"), Some(2_097_152));
        assert_eq!(snapshot.get("service_threads"), Some(4));
        assert_eq!(snapshot.get("service_voluntary_ctxt_switches"), None);
    }

    #[test]
    fn test_parse_full_record() {
        let snapshot = parse_status_record(NGINX_STATUS, &KNOWN_METRICS).unwrap();

        assert_eq!(snapshot.get("service_mem_vmrss"), Some(5872 * 1024));
        assert_eq!(snapshot.get("service_threads"), Some(1));
        assert_eq!(snapshot.get("service_voluntary_ctxt_switches"), Some(1402));
        assert_eq!(snapshot.get("service_nonvoluntary_ctxt_switches"), Some(17));
    }

    #[test]
    fn test_vmrss_is_scaled_to_bytes() {
        for kb in [0i64, 1, 4, 999, 123_456_789] {
            let content = format!("VmRSS:\t{} kB\n", kb);
            let snapshot = parse_status_record(&content, &KNOWN_METRICS).unwrap();
            assert_eq!(snapshot.get("service_mem_vmrss"), Some(kb * 1024));
        }
    }

    #[test]
    fn test_empty_record() {
        let snapshot = parse_status_record("", &KNOWN_METRICS).unwrap();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_unrelated_lines_are_ignored() {
        let snapshot = parse_status_record("Name:\tbash\nVmHWM:\t 10 kB\n", &KNOWN_METRICS).unwrap();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_field_count_mismatch() {
        // Missing unit
        assert_malformed(
            parse_status_record("VmRSS:\t2048\n", &KNOWN_METRICS),
            "VmRSS",
        );
        // Extra token
        assert_malformed(
            parse_status_record("Threads:\t4 extra\n", &KNOWN_METRICS),
            "Threads",
        );
        // Key alone
        assert_malformed(
            parse_status_record("voluntary_ctxt_switches:\n", &KNOWN_METRICS),
            "voluntary_ctxt_switches",
        );
    }

    #[test]
    fn test_non_numeric_vmrss_is_an_error() {
        assert_malformed(
            parse_status_record("VmRSS:\tlots kB\n", &KNOWN_METRICS),
            "VmRSS",
        );
    }

    #[test]
    fn test_error_discards_partial_snapshot() {
        let content = "Threads:\t4\nVmRSS:\t12 MB extra\n";
        assert_malformed(parse_status_record(content, &KNOWN_METRICS), "VmRSS");
    }

    #[test]
    fn test_overflow_is_an_error() {
        let content = format!("VmRSS:\t{} kB\n", i64::MAX);
        assert_malformed(parse_status_record(&content, &KNOWN_METRICS), "VmRSS");
    }

    #[test]
    fn test_shared_prefix_applies_every_entry() {
        static SPECS: [KnownMetricSpec; 2] = [
            KnownMetricSpec {
                status_key: "Threads",
                metric_name: "threads",
                description: "",
                expected_field_count: 1,
                multiplier: 1,
            },
            KnownMetricSpec {
                status_key: "Thr",
                metric_name: "threads_x10",
                description: "",
                expected_field_count: 1,
                multiplier: 10,
            },
        ];

        let snapshot = parse_status_record("Threads:\t3\n", &SPECS).unwrap();
        assert_eq!(snapshot.get("threads"), Some(3));
        assert_eq!(snapshot.get("threads_x10"), Some(30));
    }

    #[test]
    fn test_status_reader() {
        let mut fs = MockFs::new();
        fs.add_process_status(812, NGINX_STATUS);

        let reader = StatusReader::new(fs, "/proc", &KNOWN_METRICS);
        assert_eq!(reader.status_path(812), PathBuf::from("/proc/812/status"));

        let snapshot = reader.snapshot(812).unwrap();
        assert_eq!(snapshot.get("service_threads"), Some(1));
    }

    /// `Name:` cut by the kernel in the middle of a multibyte character.
    fn truncated_name_status() -> Vec<u8> {
        let mut status = b"Name:\t".to_vec();
        status.extend_from_slice(&"сервис-э".as_bytes()[..14]);
        status.extend_from_slice(b"\nVmRSS:\t  2048 kB\nThreads:\t4\n");
        status
    }

    #[test]
    fn test_status_reader_non_utf8_name() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/10/status", truncated_name_status());

        let reader = StatusReader::new(fs, "/proc", &KNOWN_METRICS);
        let snapshot = reader.snapshot(10).unwrap();
        assert_eq!(snapshot.get("service_mem_vmrss"), Some(2_097_152));
        assert_eq!(snapshot.get("service_threads"), Some(4));
    }

    #[test]
    fn test_status_reader_non_utf8_name_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("10")).unwrap();
        std::fs::write(
            dir.path().join("10/status"),
            b"Name:\tenc\xd1\nThreads:\t4\n",
        )
        .unwrap();

        let reader = StatusReader::new(RealFs::new(), dir.path(), &KNOWN_METRICS);
        let snapshot = reader.snapshot(10).unwrap();
        assert_eq!(snapshot.get("service_threads"), Some(4));
    }

    #[test]
    fn test_status_reader_process_gone() {
        let reader = StatusReader::new(MockFs::new(), "/proc", &KNOWN_METRICS);
        match reader.snapshot(4242) {
            Err(CollectError::SourceUnavailable { pid, .. }) => assert_eq!(pid, 4242),
            other => panic!("expected SourceUnavailable, got {:?}", other),
        }
    }
}
