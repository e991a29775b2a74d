//! Error type for collection failures.

use std::io;
use std::path::PathBuf;

/// Error type for collection failures.
///
/// Only [`CollectError::NoServiceRoots`] ever fails a whole collection pass.
/// Every other variant is contained to a single root or a single service.
#[derive(Debug)]
pub enum CollectError {
    /// Walking a service root failed; that root contributes no services.
    Discovery { path: PathBuf, source: io::Error },
    /// None of the configured service roots could be walked.
    NoServiceRoots(Vec<PathBuf>),
    /// The supervisor could not report a running process for the service.
    SupervisionUnavailable { service: String, reason: String },
    /// The status record of a process could not be read.
    SourceUnavailable { pid: u32, source: io::Error },
    /// A status line matched a known key but could not be interpreted.
    MalformedRecord {
        key: &'static str,
        line: String,
        reason: String,
    },
}

impl CollectError {
    pub(crate) fn supervision(service: impl Into<String>, reason: impl Into<String>) -> Self {
        CollectError::SupervisionUnavailable {
            service: service.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::Discovery { path, source } => {
                write!(f, "failed to walk {}: {}", path.display(), source)
            }
            CollectError::NoServiceRoots(roots) => {
                let roots: Vec<String> = roots.iter().map(|r| r.display().to_string()).collect();
                write!(f, "no service root could be walked ({})", roots.join(", "))
            }
            CollectError::SupervisionUnavailable { service, reason } => {
                write!(f, "supervision unavailable for {}: {}", service, reason)
            }
            CollectError::SourceUnavailable { pid, source } => {
                write!(f, "status of process {} unavailable: {}", pid, source)
            }
            CollectError::MalformedRecord { key, line, reason } => {
                write!(f, "malformed {} line '{}': {}", key, line, reason)
            }
        }
    }
}

impl std::error::Error for CollectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CollectError::Discovery { source, .. } => Some(source),
            CollectError::SourceUnavailable { source, .. } => Some(source),
            _ => None,
        }
    }
}
