//! runit service discovery and supervision queries.

pub mod discovery;
pub mod service;
pub mod supervise;

pub use discovery::ServiceDiscovery;
pub use service::{Service, ServiceLabels, stripped_name};
pub use supervise::{RunitSupervisor, STATUS_LEN, SvState, SvStatus, Supervisor};
