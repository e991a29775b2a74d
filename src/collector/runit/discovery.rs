//! Discovery of runit service directories.
//!
//! A directory is a service iff it has a `supervise/` subdirectory. Each root
//! is walked depth-first in lexicographic order; symlinks to directories are
//! checked for the marker but not followed further, which matches how
//! `/service` usually links into `/etc/sv`.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::collector::error::CollectError;
use crate::collector::runit::service::Service;
use crate::collector::traits::{FileKind, FileSystem};

/// Finds supervised services under a list of root directories.
pub struct ServiceDiscovery<F: FileSystem> {
    fs: F,
    roots: Vec<PathBuf>,
    marker: String,
}

impl<F: FileSystem> ServiceDiscovery<F> {
    /// Creates a discovery over `roots`, identifying services by `marker`.
    pub fn new(fs: F, roots: Vec<PathBuf>, marker: impl Into<String>) -> Self {
        Self {
            fs,
            roots,
            marker: marker.into(),
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Discovers services under every root.
    ///
    /// Roots that cannot be walked are logged and skipped. Fails only when
    /// there are roots and none of them could be walked.
    pub fn discover(&self) -> Result<Vec<Service>, CollectError> {
        let mut services = Vec::new();
        let mut failed = Vec::new();

        for root in &self.roots {
            match self.services_in_root(root) {
                Ok(found) => {
                    debug!("{}: {} services", root.display(), found.len());
                    services.extend(found);
                }
                Err(e) => {
                    warn!("Skipping service root: {}", e);
                    failed.push(root.clone());
                }
            }
        }

        if !self.roots.is_empty() && failed.len() == self.roots.len() {
            return Err(CollectError::NoServiceRoots(failed));
        }

        Ok(services)
    }

    /// Walks one root. Any traversal error aborts the walk of this root.
    pub fn services_in_root(&self, root: &Path) -> Result<Vec<Service>, CollectError> {
        let mut services = Vec::new();
        self.walk(root, &mut services)?;
        Ok(services)
    }

    /// Returns `true` if `dir` contains the marker subdirectory.
    ///
    /// A missing marker is a plain `false`; any other failure is an error.
    pub fn is_service_dir(&self, dir: &Path) -> Result<bool, CollectError> {
        self.fs
            .try_exists(&dir.join(&self.marker))
            .map_err(|source| CollectError::Discovery {
                path: dir.to_path_buf(),
                source,
            })
    }

    fn walk(&self, dir: &Path, services: &mut Vec<Service>) -> Result<(), CollectError> {
        self.visit(dir, services)?;

        let mut entries = self
            .fs
            .read_dir(dir)
            .map_err(|source| CollectError::Discovery {
                path: dir.to_path_buf(),
                source,
            })?;
        entries.sort();

        for entry in entries {
            let kind = self
                .fs
                .file_kind(&entry)
                .map_err(|source| CollectError::Discovery {
                    path: entry.clone(),
                    source,
                })?;

            match kind {
                FileKind::Dir => self.walk(&entry, services)?,
                FileKind::Symlink if self.fs.is_dir(&entry) => self.visit(&entry, services)?,
                _ => {}
            }
        }

        Ok(())
    }

    fn visit(&self, dir: &Path, services: &mut Vec<Service>) -> Result<(), CollectError> {
        if self.is_service_dir(dir)?
            && let Some(service) = Service::from_dir(dir)
        {
            services.push(service);
        }
        Ok(())
    }
}
