//! Collector configuration.

use std::path::PathBuf;

/// Service roots scanned when none are configured.
pub const DEFAULT_SERVICE_ROOTS: [&str; 2] = ["/service/", "/tmp/service/"];

/// Settings shared by discovery, supervision queries and status reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExporterConfig {
    /// Directories walked for supervised services.
    pub roots: Vec<PathBuf>,
    /// Mount point of the proc filesystem.
    pub proc_path: PathBuf,
    /// Subdirectory whose presence marks a service directory.
    pub supervise_dir: String,
    /// Optional per-service file holding the `channel_id` label.
    pub channel_id_file: String,
    /// Upper bound on bytes read from `channel_id_file`.
    pub channel_id_max_len: usize,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            roots: DEFAULT_SERVICE_ROOTS.iter().map(PathBuf::from).collect(),
            proc_path: PathBuf::from("/proc"),
            supervise_dir: "supervise".to_string(),
            channel_id_file: "channel_id".to_string(),
            channel_id_max_len: 8,
        }
    }
}

impl ExporterConfig {
    /// Replaces the service roots; an empty list keeps the defaults.
    pub fn with_roots(mut self, roots: Vec<PathBuf>) -> Self {
        if !roots.is_empty() {
            self.roots = roots;
        }
        self
    }

    pub fn with_proc_path(mut self, proc_path: impl Into<PathBuf>) -> Self {
        self.proc_path = proc_path.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExporterConfig::default();
        assert_eq!(
            config.roots,
            vec![PathBuf::from("/service/"), PathBuf::from("/tmp/service/")]
        );
        assert_eq!(config.proc_path, PathBuf::from("/proc"));
        assert_eq!(config.supervise_dir, "supervise");
        assert_eq!(config.channel_id_max_len, 8);
    }

    #[test]
    fn test_with_roots() {
        let config = ExporterConfig::default().with_roots(vec![PathBuf::from("/etc/service")]);
        assert_eq!(config.roots, vec![PathBuf::from("/etc/service")]);

        let config = ExporterConfig::default().with_roots(Vec::new());
        assert_eq!(config.roots.len(), 2);
    }
}
