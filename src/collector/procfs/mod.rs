//! Readers for the Linux `/proc` filesystem.
//!
//! Only per-process status records are consumed; see [`status`].

pub mod status;

pub use status::{
    KNOWN_METRICS, KnownMetricSpec, ProcessStatusSnapshot, StatusReader, parse_status_record,
};
