//! Service identity and metric labels.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// One supervised service, identified by its supervision directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    /// Base name of the service directory, possibly dotted. Lossy for
    /// directory names that are not UTF-8.
    pub name: String,
    /// Directory containing the service directory.
    pub path: PathBuf,
    /// Base name exactly as found on disk.
    dir_name: OsString,
}

impl Service {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let name = name.into();
        Self {
            dir_name: OsString::from(&name),
            name,
            path: path.into(),
        }
    }

    /// Builds a service from the path of its directory.
    ///
    /// Returns `None` for paths without a final component (e.g. `/`).
    pub fn from_dir(dir: &Path) -> Option<Self> {
        let dir_name = dir.file_name()?.to_os_string();
        Some(Self {
            name: dir_name.to_string_lossy().into_owned(),
            path: dir.parent().unwrap_or(Path::new("")).to_path_buf(),
            dir_name,
        })
    }

    /// Full path of the service directory.
    pub fn dir(&self) -> PathBuf {
        self.path.join(&self.dir_name)
    }

    /// Name used for the `service` label.
    pub fn stripped_name(&self) -> &str {
        stripped_name(&self.name)
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dir().display())
    }
}

/// Returns the part of `name` after its last `.`, or `name` itself.
///
/// `"foo.bar.baz"` -> `"baz"`, `"simple"` -> `"simple"`.
pub fn stripped_name(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((_, last)) => last,
        None => name,
    }
}

/// Ordered label list attached to every sample of one service.
///
/// Keys and values are stored as pairs, so [`keys`](Self::keys) and
/// [`values`](Self::values) always line up index for index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceLabels {
    pairs: Vec<(&'static str, String)>,
}

impl ServiceLabels {
    pub const SERVICE: &'static str = "service";
    pub const CHANNEL_ID: &'static str = "channel_id";

    /// Builds labels for `service`. An empty `channel_id` is omitted.
    pub fn new(service: &Service, channel_id: &str) -> Self {
        let mut pairs = vec![(Self::SERVICE, service.stripped_name().to_string())];
        if !channel_id.is_empty() {
            pairs.push((Self::CHANNEL_ID, channel_id.to_string()));
        }
        Self { pairs }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> Vec<String> {
        self.pairs.iter().map(|(k, _)| k.to_string()).collect()
    }

    pub fn values(&self) -> Vec<String> {
        self.pairs.iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
