//! In-memory mock filesystem for testing collectors without real service trees.
//!
//! This module provides `MockFs` which simulates a filesystem in memory,
//! allowing tests to run on any host without runit or Linux `/proc`.

use crate::collector::traits::{FileKind, FileSystem};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

/// In-memory filesystem for testing.
///
/// Stores files, directories, directory symlinks and FIFOs in memory. Paths
/// can be marked as denied to simulate permission errors on them and
/// everything beneath them.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    /// Map from path to file contents.
    files: HashMap<PathBuf, Vec<u8>>,
    /// Set of directories (for read_dir support).
    directories: HashSet<PathBuf>,
    /// Map from symlink path to its target.
    symlinks: HashMap<PathBuf, PathBuf>,
    /// Map from FIFO path to whether a reader holds it open.
    fifos: HashMap<PathBuf, bool>,
    /// Paths whose access fails with `PermissionDenied`.
    denied: HashSet<PathBuf>,
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file with the given content.
    ///
    /// Parent directories are automatically created.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.files.insert(path, content.into());
    }

    /// Adds an empty directory.
    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.directories.insert(path);
    }

    /// Adds a symlink at `link` pointing to `target`.
    pub fn add_symlink(&mut self, link: impl AsRef<Path>, target: impl AsRef<Path>) {
        let link = link.as_ref().to_path_buf();
        self.add_parents(&link);
        self.symlinks.insert(link, target.as_ref().to_path_buf());
    }

    /// Adds a FIFO. With `listening` unset, opening it for writing fails the
    /// way it does when no process reads from it.
    pub fn add_fifo(&mut self, path: impl AsRef<Path>, listening: bool) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.fifos.insert(path, listening);
    }

    /// Makes every access to `path` (and anything below it) fail with
    /// `PermissionDenied`.
    pub fn deny(&mut self, path: impl AsRef<Path>) {
        self.denied.insert(path.as_ref().to_path_buf());
    }

    /// Removes a file, e.g. to simulate a process exiting.
    pub fn remove_file(&mut self, path: impl AsRef<Path>) {
        self.files.remove(path.as_ref());
    }

    /// Adds `/proc/[pid]/status` with the given content.
    pub fn add_process_status(&mut self, pid: u32, status: &str) {
        self.add_file(format!("/proc/{}/status", pid), status);
    }

    fn add_parents(&mut self, path: &Path) {
        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                self.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }
    }

    fn check_access(&self, path: &Path) -> io::Result<()> {
        if self.denied.iter().any(|d| path.starts_with(d)) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("permission denied: {:?}", path),
            ));
        }
        Ok(())
    }

    /// Resolves symlinks in every component of `path`.
    fn resolve(&self, path: &Path) -> PathBuf {
        let mut resolved = PathBuf::new();
        for component in path.components() {
            resolved.push(component);
            // Bounded to avoid looping on symlink cycles.
            for _ in 0..8 {
                match self.symlinks.get(&resolved) {
                    Some(target) => resolved = target.clone(),
                    None => break,
                }
            }
        }
        resolved
    }

    #[cfg(unix)]
    fn no_reader(_path: &Path) -> io::Error {
        io::Error::from_raw_os_error(libc::ENXIO)
    }

    #[cfg(not(unix))]
    fn no_reader(path: &Path) -> io::Error {
        io::Error::other(format!("no reader on fifo: {:?}", path))
    }

    fn not_found(path: &Path) -> io::Error {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("file not found: {:?}", path),
        )
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.check_access(path)?;
        let resolved = self.resolve(path);
        self.check_access(&resolved)?;
        self.files
            .get(&resolved)
            .cloned()
            .ok_or_else(|| Self::not_found(path))
    }

    fn read_prefix(&self, path: &Path, limit: usize) -> io::Result<Vec<u8>> {
        let mut bytes = self.read(path)?;
        bytes.truncate(limit);
        Ok(bytes)
    }

    fn try_exists(&self, path: &Path) -> io::Result<bool> {
        self.check_access(path)?;
        let resolved = self.resolve(path);
        self.check_access(&resolved)?;
        Ok(self.files.contains_key(&resolved)
            || self.directories.contains(&resolved)
            || self.fifos.contains_key(&resolved))
    }

    fn file_kind(&self, path: &Path) -> io::Result<FileKind> {
        self.check_access(path)?;
        if self.symlinks.contains_key(path) {
            return Ok(FileKind::Symlink);
        }
        let resolved = match path.parent() {
            Some(parent) => self.resolve(parent).join(path.file_name().unwrap_or_default()),
            None => path.to_path_buf(),
        };
        if self.directories.contains(&resolved) {
            Ok(FileKind::Dir)
        } else if self.files.contains_key(&resolved) {
            Ok(FileKind::File)
        } else if self.fifos.contains_key(&resolved) {
            Ok(FileKind::Other)
        } else {
            Err(Self::not_found(path))
        }
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.check_access(path).is_ok() && self.directories.contains(&self.resolve(path))
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        self.check_access(path)?;
        let resolved = self.resolve(path);
        self.check_access(&resolved)?;
        if !self.directories.contains(&resolved) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory not found: {:?}", path),
            ));
        }

        let mut names = HashSet::new();

        // Find all files, directories and symlinks that are direct children
        let children = self
            .files
            .keys()
            .chain(self.directories.iter())
            .chain(self.symlinks.keys())
            .chain(self.fifos.keys());
        for child in children {
            if child != &resolved
                && child.parent().is_some_and(|parent| parent == resolved)
                && let Some(name) = child.file_name()
            {
                names.insert(name.to_os_string());
            }
        }

        // Entries are reported under the requested path, as std::fs does.
        Ok(names.into_iter().map(|name| path.join(name)).collect())
    }

    fn open_fifo_writer(&self, path: &Path) -> io::Result<()> {
        self.check_access(path)?;
        let resolved = self.resolve(path);
        self.check_access(&resolved)?;
        match self.fifos.get(&resolved) {
            Some(true) => Ok(()),
            Some(false) => Err(Self::no_reader(path)),
            None => Err(Self::not_found(path)),
        }
    }
}
