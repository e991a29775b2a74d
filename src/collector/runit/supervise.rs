//! Client side of the runit supervision protocol.
//!
//! `runsv` keeps a 20-byte binary record in `<service>/supervise/status`:
//!
//! ```text
//! 0      8      12     16  17  18  19
//! ┌──────┬──────┬──────┬───┬───┬───┬───┐
//! │ tai  │ nano │ pid  │ P │ W │ T │ S │
//! └──────┴──────┴──────┴───┴───┴───┴───┘
//! tai, nano: big-endian TAI64N of the last state change
//! pid:       little-endian
//! P paused, W want ('u'/'d'), T term sent, S state (0 down, 1 run, 2 finish)
//! ```
//!
//! The record outlives `runsv` itself, so it is only trusted while `runsv`
//! holds the `supervise/ok` FIFO open for reading.

use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::collector::error::CollectError;
use crate::collector::runit::service::Service;
use crate::collector::traits::FileSystem;
use crate::config::ExporterConfig;

/// Size of the `supervise/status` record.
pub const STATUS_LEN: usize = 20;

/// TAI64 label of the Unix epoch (2^62 + 10 leap seconds).
const TAI_OFFSET: u64 = (1 << 62) + 10;

/// Run state reported by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SvState {
    Down,
    Run,
    Finish,
    Unknown(u8),
}

impl From<u8> for SvState {
    fn from(b: u8) -> Self {
        match b {
            0 => SvState::Down,
            1 => SvState::Run,
            2 => SvState::Finish,
            other => SvState::Unknown(other),
        }
    }
}

impl SvState {
    fn as_byte(self) -> u8 {
        match self {
            SvState::Down => 0,
            SvState::Run => 1,
            SvState::Finish => 2,
            SvState::Unknown(b) => b,
        }
    }
}

impl std::fmt::Display for SvState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SvState::Down => write!(f, "down"),
            SvState::Run => write!(f, "run"),
            SvState::Finish => write!(f, "finish"),
            SvState::Unknown(b) => write!(f, "unknown state {}", b),
        }
    }
}

/// Decoded `supervise/status` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvStatus {
    pub pid: u32,
    pub state: SvState,
    /// Time of the last state change, if representable.
    pub since: Option<DateTime<Utc>>,
    pub paused: bool,
    pub want_up: bool,
    pub term_sent: bool,
}

impl SvStatus {
    /// Decodes a raw status record.
    pub fn decode(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() != STATUS_LEN {
            return Err(format!(
                "status record is {} bytes, expected {}",
                bytes.len(),
                STATUS_LEN
            ));
        }

        let mut tai = [0u8; 8];
        tai.copy_from_slice(&bytes[0..8]);
        let mut nanos = [0u8; 4];
        nanos.copy_from_slice(&bytes[8..12]);
        let mut pid = [0u8; 4];
        pid.copy_from_slice(&bytes[12..16]);

        let since = u64::from_be_bytes(tai)
            .checked_sub(TAI_OFFSET)
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(|secs| DateTime::from_timestamp(secs, u32::from_be_bytes(nanos)));

        Ok(Self {
            pid: u32::from_le_bytes(pid),
            state: SvState::from(bytes[19]),
            since,
            paused: bytes[16] != 0,
            want_up: bytes[17] == b'u',
            term_sent: bytes[18] != 0,
        })
    }

    /// Encodes the record the way `runsv` writes it.
    pub fn encode(&self) -> [u8; STATUS_LEN] {
        let mut out = [0u8; STATUS_LEN];
        if let Some(since) = self.since {
            let tai = (since.timestamp() as u64).wrapping_add(TAI_OFFSET);
            out[0..8].copy_from_slice(&tai.to_be_bytes());
            out[8..12].copy_from_slice(&since.timestamp_subsec_nanos().to_be_bytes());
        }
        out[12..16].copy_from_slice(&self.pid.to_le_bytes());
        out[16] = self.paused as u8;
        out[17] = if self.want_up { b'u' } else { b'd' };
        out[18] = self.term_sent as u8;
        out[19] = self.state.as_byte();
        out
    }

    /// Record of a service running as `pid` since `since`.
    pub fn running(pid: u32, since: DateTime<Utc>) -> Self {
        Self {
            pid,
            state: SvState::Run,
            since: Some(since),
            paused: false,
            want_up: true,
            term_sent: false,
        }
    }

    /// Returns the pid of the current run, if the service is running.
    pub fn live_pid(&self) -> Option<u32> {
        (self.state == SvState::Run && self.pid != 0).then_some(self.pid)
    }
}

/// Point-in-time queries against a process supervisor.
pub trait Supervisor: Send + Sync {
    /// Reads the supervisor's current status record for `service`.
    fn status(&self, service: &Service) -> Result<SvStatus, CollectError>;

    /// Returns the service's `channel_id`, or an empty string when there is none.
    fn channel_id(&self, service: &Service) -> String;

    /// Returns the pid of the service's current run.
    fn live_pid(&self, service: &Service) -> Result<u32, CollectError> {
        let status = self.status(service)?;
        status.live_pid().ok_or_else(|| {
            CollectError::supervision(service.to_string(), format!("service is {}", status.state))
        })
    }
}

/// [`Supervisor`] reading runit's on-disk state.
pub struct RunitSupervisor<F: FileSystem> {
    fs: F,
    supervise_dir: String,
    channel_id_file: String,
    channel_id_max_len: usize,
}

impl<F: FileSystem> RunitSupervisor<F> {
    pub fn new(fs: F, config: &ExporterConfig) -> Self {
        Self {
            fs,
            supervise_dir: config.supervise_dir.clone(),
            channel_id_file: config.channel_id_file.clone(),
            channel_id_max_len: config.channel_id_max_len,
        }
    }
}

impl<F: FileSystem> RunitSupervisor<F> {
    /// Fails unless `runsv` is listening on `supervise/ok`.
    fn ensure_runsv(&self, service: &Service, supervise: &Path) -> Result<(), CollectError> {
        let ok = supervise.join("ok");
        self.fs.open_fifo_writer(&ok).map_err(|e| {
            let reason = if runsv_gone(&e) {
                "runsv not running".to_string()
            } else {
                format!("cannot open {}: {}", ok.display(), e)
            };
            CollectError::supervision(service.to_string(), reason)
        })
    }
}

/// `ok` is missing, or exists with no reader behind it.
fn runsv_gone(e: &io::Error) -> bool {
    #[cfg(unix)]
    {
        if e.raw_os_error() == Some(libc::ENXIO) {
            return true;
        }
    }
    e.kind() == io::ErrorKind::NotFound
}

impl<F: FileSystem> Supervisor for RunitSupervisor<F> {
    fn status(&self, service: &Service) -> Result<SvStatus, CollectError> {
        let supervise = service.dir().join(&self.supervise_dir);
        self.ensure_runsv(service, &supervise)?;

        let path = supervise.join("status");
        let bytes = self.fs.read(&path).map_err(|e| {
            CollectError::supervision(
                service.to_string(),
                format!("cannot read {}: {}", path.display(), e),
            )
        })?;
        let status = SvStatus::decode(&bytes)
            .map_err(|reason| CollectError::supervision(service.to_string(), reason))?;

        debug!(
            "{}: state={} pid={} since={:?} want_up={} paused={}",
            service, status.state, status.pid, status.since, status.want_up, status.paused
        );
        Ok(status)
    }

    fn channel_id(&self, service: &Service) -> String {
        let path = service.dir().join(&self.channel_id_file);
        match self.fs.read_prefix(&path, self.channel_id_max_len) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_string(),
            Err(_) => String::new(),
        }
    }
}
