//! Rendering samples for stdout and node_exporter's textfile collector.

use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::metrics::exposition::render_text;
use crate::metrics::sample::MetricSample;

/// Output encoding of a collection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Prometheus text exposition format.
    #[default]
    Prometheus,
    /// One JSON object per sample, one per line.
    Json,
}

/// Error type for rendering failures.
#[derive(Debug)]
pub enum RenderError {
    Prometheus(prometheus::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::Prometheus(e) => write!(f, "prometheus encoding failed: {}", e),
            RenderError::Json(e) => write!(f, "JSON encoding failed: {}", e),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Prometheus(e) => Some(e),
            RenderError::Json(e) => Some(e),
        }
    }
}

impl From<prometheus::Error> for RenderError {
    fn from(e: prometheus::Error) -> Self {
        RenderError::Prometheus(e)
    }
}

impl From<serde_json::Error> for RenderError {
    fn from(e: serde_json::Error) -> Self {
        RenderError::Json(e)
    }
}

/// Renders samples in the requested format.
pub fn render(format: OutputFormat, samples: &[MetricSample]) -> Result<String, RenderError> {
    match format {
        OutputFormat::Prometheus => Ok(render_text(samples)?),
        OutputFormat::Json => {
            let mut out = String::new();
            for sample in samples {
                out.push_str(&serde_json::to_string(sample)?);
                out.push('\n');
            }
            Ok(out)
        }
    }
}

/// Replaces `path` with `contents` atomically.
///
/// The data is written to a temporary file in the same directory and renamed
/// over `path`, so readers never see a partially written file.
pub fn write_textfile(path: &Path, contents: &str) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))?;
    }

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
