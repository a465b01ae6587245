// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! PID and status marker files in the service data directory.
//!
//! `herald.pid` holds the decimal PID of the running service and
//! `herald.status.json` the last [`ServiceStatus`] it published. Both are
//! removed on clean shutdown; markers naming a dead process are stale and
//! removed by whoever notices.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use herald_core::{HeraldError, ServiceStatus};
use tracing::{debug, warn};

pub const PID_FILE: &str = "herald.pid";
pub const STATUS_FILE: &str = "herald.status.json";

/// Marker files under one data directory.
#[derive(Debug, Clone)]
pub struct Markers {
    dir: PathBuf,
}

impl Markers {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn pid_path(&self) -> PathBuf {
        self.dir.join(PID_FILE)
    }

    pub fn status_path(&self) -> PathBuf {
        self.dir.join(STATUS_FILE)
    }

    /// PID recorded in the marker, if the file exists and parses.
    pub fn read_pid(&self) -> Option<u32> {
        let raw = std::fs::read_to_string(self.pid_path()).ok()?;
        match raw.trim().parse() {
            Ok(pid) => Some(pid),
            Err(_) => {
                warn!(path = %self.pid_path().display(), "ignoring malformed PID marker");
                None
            }
        }
    }

    pub fn read_status(&self) -> Option<ServiceStatus> {
        let raw = std::fs::read_to_string(self.status_path()).ok()?;
        serde_json::from_str(&raw)
            .inspect_err(|e| warn!(error = %e, "ignoring malformed status marker"))
            .ok()
    }

    /// Write both markers for `pid`.
    pub fn write(&self, pid: u32, status: &ServiceStatus) -> Result<(), HeraldError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            HeraldError::Lifecycle(format!(
                "cannot create data directory `{}`: {e}",
                self.dir.display()
            ))
        })?;
        write_atomic(&self.pid_path(), format!("{pid}\n").as_bytes())?;
        self.write_status(status)
    }

    /// Replace the status marker only.
    pub fn write_status(&self, status: &ServiceStatus) -> Result<(), HeraldError> {
        let body = serde_json::to_vec_pretty(status)
            .map_err(|e| HeraldError::Internal(format!("cannot encode status marker: {e}")))?;
        write_atomic(&self.status_path(), &body)
    }

    /// Remove both markers. Missing files are fine.
    pub fn remove(&self) {
        for path in [self.pid_path(), self.status_path()] {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed marker"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "cannot remove marker"),
            }
        }
    }

    pub fn exists(&self) -> bool {
        self.pid_path().exists() || self.status_path().exists()
    }

    /// PID of a live service other than this process, cleaning stale markers.
    pub fn live_pid(&self) -> Option<u32> {
        match self.read_pid() {
            Some(pid) if pid != std::process::id() && process_alive(pid) => Some(pid),
            _ => {
                if self.exists() {
                    debug!(dir = %self.dir.display(), "removing stale markers");
                    self.remove();
                }
                None
            }
        }
    }

    /// Status of a service running in another process, reconstructed from
    /// the markers. Stale markers are removed and reported as stopped.
    pub fn external_status(&self) -> ServiceStatus {
        let Some(pid) = self.live_pid() else {
            return ServiceStatus::stopped();
        };
        let mut status = self.read_status().unwrap_or_else(ServiceStatus::stopped);
        status.running = true;
        status.pid = Some(pid);
        if status.state == herald_core::ServiceState::Stopped {
            status.state = herald_core::ServiceState::Running;
        }
        status.uptime_secs = status
            .started_at
            .map(|at| (Utc::now() - at).num_seconds().max(0) as u64);
        status
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), HeraldError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let fail = |e: std::io::Error| {
        HeraldError::Lifecycle(format!("cannot write `{}`: {e}", path.display()))
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(fail)?;
    tmp.write_all(contents).map_err(fail)?;
    tmp.persist(path).map_err(|e| fail(e.error))?;
    Ok(())
}

/// True if a process with `pid` exists.
#[cfg(unix)]
pub fn process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // SAFETY: signal 0 performs only the existence and permission check.
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
pub fn process_alive(pid: u32) -> bool {
    pid == std::process::id()
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::ServiceState;

    fn running_status() -> ServiceStatus {
        ServiceStatus {
            state: ServiceState::Running,
            running: true,
            pid: None,
            host: Some("127.0.0.1".into()),
            port: Some(7410),
            started_at: Some(Utc::now()),
            uptime_secs: None,
            plugins: Default::default(),
        }
    }

    #[test]
    fn write_read_remove() {
        let dir = tempfile::tempdir().unwrap();
        let markers = Markers::new(dir.path().join("data"));
        markers.write(4242, &running_status()).unwrap();

        assert_eq!(markers.read_pid(), Some(4242));
        assert_eq!(markers.read_status().unwrap().port, Some(7410));

        markers.remove();
        assert!(!markers.exists());
        markers.remove();
    }

    #[test]
    fn own_pid_counts_as_stale() {
        let dir = tempfile::tempdir().unwrap();
        let markers = Markers::new(dir.path());
        markers.write(std::process::id(), &running_status()).unwrap();

        assert_eq!(markers.live_pid(), None);
        assert!(!markers.exists());
    }

    #[test]
    fn malformed_pid_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let markers = Markers::new(dir.path());
        std::fs::write(markers.pid_path(), "not-a-pid").unwrap();
        assert_eq!(markers.read_pid(), None);
        assert!(!markers.external_status().running);
    }

    #[cfg(unix)]
    #[test]
    fn live_process_is_reported_running() {
        let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let markers = Markers::new(dir.path());
        markers.write(child.id(), &running_status()).unwrap();

        let status = markers.external_status();
        assert!(status.running);
        assert_eq!(status.pid, Some(child.id()));
        assert_eq!(status.state, ServiceState::Running);
        assert!(status.uptime_secs.is_some());

        child.kill().unwrap();
        child.wait().unwrap();
        assert!(!markers.external_status().running);
        assert!(!markers.exists());
    }

    #[cfg(unix)]
    #[test]
    fn process_alive_checks() {
        assert!(process_alive(std::process::id()));
        assert!(!process_alive(0));
    }
}
