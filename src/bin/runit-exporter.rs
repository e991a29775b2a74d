//! runit-exporter - status metrics for runit-supervised services.
//!
//! Periodically discovers runit services, reads `/proc/[pid]/status` of each
//! supervised process and writes the resulting gauges to stdout or to a
//! textfile picked up by node_exporter.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use runit_exporter::collector::{RealFs, ServiceCollector};
use runit_exporter::config::ExporterConfig;
use runit_exporter::metrics::{OutputFormat, render, write_textfile};

/// Status metrics exporter for runit services.
#[derive(Parser)]
#[command(
    name = "runit-exporter",
    about = "Status metrics exporter for runit services",
    version
)]
struct Args {
    /// Directory to scan for services. Repeat or separate with commas.
    /// Defaults to /service/ and /tmp/service/.
    #[arg(
        short,
        long = "root",
        value_name = "DIR",
        env = "RUNIT_EXPORTER_ROOTS",
        value_delimiter = ','
    )]
    roots: Vec<PathBuf>,

    /// Path to /proc filesystem (for testing/containers).
    #[arg(long, default_value = "/proc")]
    proc_path: PathBuf,

    /// Collection interval in seconds.
    #[arg(short, long, default_value = "15")]
    interval: u64,

    /// Run a single collection pass and exit.
    #[arg(long)]
    once: bool,

    /// Write each pass to this file atomically instead of stdout.
    #[arg(long, value_name = "PATH", env = "RUNIT_EXPORTER_TEXTFILE")]
    textfile: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = Format::Prometheus)]
    format: Format,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Prometheus,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(f: Format) -> Self {
        match f {
            Format::Prometheus => OutputFormat::Prometheus,
            Format::Json => OutputFormat::Json,
        }
    }
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Logs go to stderr so stdout carries only metrics.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    // The library and the binary both log under the `runit_exporter` target.
    let mut filter = EnvFilter::from_default_env();
    match format!("runit_exporter={}", level).parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("invalid log directive: {}", e),
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Runs one pass and delivers its output. Returns `false` if the pass failed.
fn run_pass(collector: &ServiceCollector<RealFs>, args: &Args, pass: u64) -> bool {
    let (samples, summary) = match collector.collect() {
        Ok(result) => result,
        Err(e) => {
            error!("Collection pass #{} failed: {}", pass, e);
            return false;
        }
    };

    info!(
        "Pass #{}: {} services, {} failed, {} samples ({:?})",
        pass, summary.services, summary.failed, summary.samples, summary.elapsed
    );

    let output = match render(args.format.into(), &samples) {
        Ok(output) => output,
        Err(e) => {
            error!("Failed to render pass #{}: {}", pass, e);
            return false;
        }
    };

    match &args.textfile {
        Some(path) => {
            if let Err(e) = write_textfile(path, &output) {
                error!("Failed to write {}: {}", path.display(), e);
                return false;
            }
            debug!("Wrote {} bytes to {}", output.len(), path.display());
        }
        None => print!("{}", output),
    }

    true
}

fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    let config = ExporterConfig::default()
        .with_roots(args.roots.clone())
        .with_proc_path(args.proc_path.clone());

    info!("runit-exporter {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: roots={:?}, proc={}, interval={}s",
        config.roots,
        config.proc_path.display(),
        args.interval
    );

    let collector = ServiceCollector::new(RealFs::new(), &config);

    if args.once {
        return if run_pass(&collector, &args, 1) {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        };
    }

    let interval = Duration::from_secs(args.interval.max(1));

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    info!("Starting collection loop");

    let mut pass: u64 = 0;
    while running.load(Ordering::SeqCst) {
        pass += 1;
        run_pass(&collector, &args, pass);

        // Sleep with periodic checks for shutdown signal
        let sleep_interval = Duration::from_millis(100);
        let mut remaining = interval;
        while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
            let sleep_time = remaining.min(sleep_interval);
            std::thread::sleep(sleep_time);
            remaining = remaining.saturating_sub(sleep_time);
        }
    }

    info!("Shutdown complete");
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["runit-exporter"]).unwrap();
        assert!(args.roots.is_empty());
        assert_eq!(args.proc_path, PathBuf::from("/proc"));
        assert_eq!(args.interval, 15);
        assert!(!args.once);
        assert!(matches!(args.format, Format::Prometheus));
    }

    #[test]
    fn test_args_roots() {
        let args = Args::try_parse_from([
            "runit-exporter",
            "--root",
            "/service,/etc/service",
            "-r",
            "/tmp/service",
            "--format",
            "json",
            "--once",
        ])
        .unwrap();
        assert_eq!(
            args.roots,
            vec![
                PathBuf::from("/service"),
                PathBuf::from("/etc/service"),
                PathBuf::from("/tmp/service"),
            ]
        );
        assert!(matches!(args.format, Format::Json));
        assert!(args.once);
    }
}
