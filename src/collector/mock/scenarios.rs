//! Pre-built mock filesystem scenarios for testing.
//!
//! These scenarios provide realistic runit service trees together with the
//! `/proc` state of the supervised processes.

use chrono::{DateTime, Utc};

use super::filesystem::MockFs;
use crate::collector::runit::{SvState, SvStatus};

fn started_at() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
}

fn supervise_dir(root: &str, name: &str) -> String {
    format!("{}/{}/supervise", root.trim_end_matches('/'), name)
}

impl MockFs {
    /// Adds a running service `root/name` supervised as `pid`.
    pub fn add_running_service(&mut self, root: &str, name: &str, pid: u32) {
        let supervise = supervise_dir(root, name);
        let status = SvStatus::running(pid, started_at());
        self.add_file(format!("{}/status", supervise), status.encode());
        self.add_fifo(format!("{}/ok", supervise), true);
    }

    /// Adds a service `root/name` that runsv reports as down.
    pub fn add_down_service(&mut self, root: &str, name: &str) {
        let supervise = supervise_dir(root, name);
        let status = SvStatus {
            pid: 0,
            state: SvState::Down,
            since: Some(started_at()),
            paused: false,
            want_up: false,
            term_sent: false,
        };
        self.add_file(format!("{}/status", supervise), status.encode());
        self.add_fifo(format!("{}/ok", supervise), true);
    }

    /// Adds a service `root/name` whose runsv died while it ran as `pid`.
    ///
    /// The status record still says *run*, but nothing listens on `ok`.
    pub fn add_orphaned_service(&mut self, root: &str, name: &str, pid: u32) {
        self.add_running_service(root, name, pid);
        self.add_fifo(format!("{}/ok", supervise_dir(root, name)), false);
    }

    /// Creates a typical encoder appliance.
    ///
    /// Includes: `pearl.encoder` (pid 1200, `channel_id` 3), `web` (pid 1300)
    /// and its `web/log` logger service, which is down.
    pub fn typical_services() -> Self {
        let mut fs = Self::new();

        fs.add_running_service("/service", "pearl.encoder", 1200);
        fs.add_file("/service/pearl.encoder/run", "#!/bin/sh\nexec encoder\n");
        fs.add_file("/service/pearl.encoder/channel_id", "3\n");
        fs.add_process_status(
            1200,
            "\
Name:\tencoder
Umask:\t0022
State:\tS (sleeping)
Tgid:\t1200
Pid:\t1200
PPid:\t1180
VmPeak:\t  240128 kB
VmSize:\t  238004 kB
VmHWM:\t    4100 kB
VmRSS:\t    2048 kB
Threads:\t4
voluntary_ctxt_switches:\t90211
nonvoluntary_ctxt_switches:\t312
",
        );

        fs.add_running_service("/service", "web", 1300);
        fs.add_file("/service/web/run", "#!/bin/sh\nexec nginx -g 'daemon off;'\n");
        fs.add_down_service("/service/web", "log");
        fs.add_process_status(
            1300,
            "\
Name:\tnginx
State:\tS (sleeping)
Pid:\t1300
PPid:\t1290
VmRSS:\t    5872 kB
Threads:\t1
voluntary_ctxt_switches:\t1402
nonvoluntary_ctxt_switches:\t17
",
        );

        fs
    }
}
