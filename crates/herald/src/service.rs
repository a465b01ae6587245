// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Service lifecycle: `stopped → starting → running → stopping → stopped`.
//!
//! A [`ServiceController`] owns every long-lived component of a running
//! service. Components are built in [`start`](ServiceController::start) and
//! torn down in reverse in [`stop`](ServiceController::stop). A service
//! running in another process is reached through its marker files.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use herald_config::{ConfigManager, ConfigWatcher, spawn_change_listener};
use herald_core::{HeraldError, ServiceState, ServiceStatus};
use herald_cron::Scheduler;
use herald_gateway::GatewayState;
use herald_plugin::{PluginRegistry, PluginRuntime};
use herald_storage::Database;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::compose::{default_registry, open_components};
use crate::markers::{Markers, process_alive};
use crate::reload::ReloadCoordinator;
use crate::shutdown::install_signal_handler;

/// Poll interval while waiting for an external process to exit.
const EXIT_POLL: Duration = Duration::from_millis(100);

/// Result of a stop request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StopOutcome {
    /// Nothing was running.
    NotRunning,
    /// The in-process service was stopped.
    Stopped,
    /// An external service was signalled and exited.
    Signalled { pid: u32, forced: bool },
}

/// Inputs to [`ServiceStatus`] that stay fixed while the service runs.
struct LiveStatus {
    state: Arc<Mutex<ServiceState>>,
    runtime: Arc<PluginRuntime>,
    scheduler: Arc<Scheduler>,
    addr: SocketAddr,
    started_at: DateTime<Utc>,
}

impl LiveStatus {
    fn snapshot(&self) -> ServiceStatus {
        let state = *self.state.lock().unwrap_or_else(PoisonError::into_inner);
        ServiceStatus {
            state,
            running: matches!(state, ServiceState::Running | ServiceState::Stopping),
            pid: Some(std::process::id()),
            host: Some(self.addr.ip().to_string()),
            port: Some(self.addr.port()),
            started_at: Some(self.started_at),
            uptime_secs: Some((Utc::now() - self.started_at).num_seconds().max(0) as u64),
            plugins: self.runtime.counts(self.scheduler.scheduled_count()),
        }
    }
}

struct RunningService {
    live: Arc<LiveStatus>,
    db: Database,
    watcher: Option<ConfigWatcher>,
    reload_cancel: CancellationToken,
    reload_task: JoinHandle<()>,
    server_cancel: CancellationToken,
    server_task: JoinHandle<()>,
    signals: CancellationToken,
}

pub struct ServiceController {
    manager: Arc<ConfigManager>,
    registry: Option<Arc<PluginRegistry>>,
    state: Arc<Mutex<ServiceState>>,
    running: tokio::sync::Mutex<Option<RunningService>>,
}

impl ServiceController {
    pub fn new(manager: Arc<ConfigManager>) -> Self {
        Self {
            manager,
            registry: None,
            state: Arc::new(Mutex::new(ServiceState::Stopped)),
            running: tokio::sync::Mutex::new(None),
        }
    }

    /// Use `registry` instead of the built-ins and extension directory.
    pub fn with_registry(mut self, registry: PluginRegistry) -> Self {
        self.registry = Some(Arc::new(registry));
        self
    }

    pub fn manager(&self) -> &Arc<ConfigManager> {
        &self.manager
    }

    fn markers(&self) -> Markers {
        Markers::new(&self.manager.current().service.data_dir)
    }

    fn set_state(&self, state: ServiceState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub fn state(&self) -> ServiceState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start every component and begin serving.
    ///
    /// Returns the token cancelled by SIGINT/SIGTERM (or by a failed server);
    /// the caller waits on it and then calls [`stop`](Self::stop).
    pub async fn start(&self) -> Result<CancellationToken, HeraldError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(HeraldError::Lifecycle("service is already running".into()));
        }
        let markers = self.markers();
        if let Some(pid) = markers.live_pid() {
            return Err(HeraldError::Lifecycle(format!(
                "service is already running as pid {pid} (markers in `{}`)",
                markers.dir().display()
            )));
        }

        self.set_state(ServiceState::Starting);
        match self.launch(&markers).await {
            Ok(service) => {
                let signals = service.signals.clone();
                *running = Some(service);
                Ok(signals)
            }
            Err(e) => {
                error!(error = %e, "service failed to start");
                self.set_state(ServiceState::Stopped);
                Err(e)
            }
        }
    }

    async fn launch(&self, markers: &Markers) -> Result<RunningService, HeraldError> {
        let config = self.manager.current();
        let listener = herald_gateway::bind(&config.service.host, config.service.port).await?;
        let addr = listener
            .local_addr()
            .map_err(|e| HeraldError::Lifecycle(format!("cannot read listener address: {e}")))?;

        let registry = match &self.registry {
            Some(registry) => registry.clone(),
            None => Arc::new(default_registry(&config)?),
        };
        let components = open_components(config.clone(), registry).await?;
        let runtime = components.runtime;
        let initialized = runtime.initialize_all().await;

        let scheduler = Arc::new(Scheduler::new(runtime.clone()));
        let live = Arc::new(LiveStatus {
            state: self.state.clone(),
            runtime: runtime.clone(),
            scheduler: scheduler.clone(),
            addr,
            started_at: Utc::now(),
        });

        let pid = std::process::id();
        if let Err(e) = markers.write(pid, &live.snapshot()) {
            runtime.shutdown_all().await;
            return Err(e);
        }

        let signals = install_signal_handler();

        let watcher = if config.watcher.enabled {
            let debounce = Duration::from_millis(config.watcher.debounce_ms);
            match ConfigWatcher::start(self.manager.clone(), debounce) {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    signals.cancel();
                    runtime.shutdown_all().await;
                    markers.remove();
                    return Err(HeraldError::Lifecycle(format!(
                        "cannot start config watcher: {e}"
                    )));
                }
            }
        } else {
            None
        };

        let scheduled = scheduler.start(&config.plugins);
        let reload_cancel = CancellationToken::new();
        let reload_task = spawn_change_listener(
            &self.manager,
            Arc::new(ReloadCoordinator::new(runtime.clone(), scheduler.clone())),
            reload_cancel.clone(),
        );

        let status_source = live.clone();
        let gateway = GatewayState::new(runtime.clone(), Arc::new(move || status_source.snapshot()));
        let server_cancel = CancellationToken::new();
        let server_task = {
            let shutdown = server_cancel.clone();
            let signals = signals.clone();
            tokio::spawn(async move {
                if let Err(e) = herald_gateway::serve(listener, gateway, shutdown).await {
                    error!(error = %e, "gateway failed; stopping service");
                    signals.cancel();
                }
            })
        };

        self.set_state(ServiceState::Running);
        if let Err(e) = markers.write_status(&live.snapshot()) {
            warn!(error = %e, "cannot update status marker");
        }
        info!(
            %addr,
            pid,
            initialized,
            scheduled,
            "herald service running"
        );

        Ok(RunningService {
            live,
            db: components.db,
            watcher,
            reload_cancel,
            reload_task,
            server_cancel,
            server_task,
            signals,
        })
    }

    /// Stop the in-process service, or signal the one named by the markers.
    ///
    /// Never fails for a service that is already stopped.
    pub async fn stop(&self) -> Result<StopOutcome, HeraldError> {
        let mut running = self.running.lock().await;
        let Some(service) = running.take() else {
            let config = self.manager.current();
            let wait = Duration::from_secs(config.service.shutdown_timeout_secs);
            return stop_external(&self.markers(), wait).await;
        };

        self.set_state(ServiceState::Stopping);
        let timeout = Duration::from_secs(self.manager.current().service.shutdown_timeout_secs);
        info!("stopping herald service");

        service.server_cancel.cancel();
        if tokio::time::timeout(timeout, service.server_task).await.is_err() {
            warn!("gateway did not drain in time");
        }

        if let Some(watcher) = service.watcher {
            watcher.stop().await;
        }
        service.reload_cancel.cancel();
        let mut reload_task = service.reload_task;
        if tokio::time::timeout(timeout, &mut reload_task).await.is_err() {
            warn!("configuration reload did not finish in time; abandoning it");
            reload_task.abort();
        }
        service.live.scheduler.stop();

        let runtime = &service.live.runtime;
        if !runtime.wait_idle(timeout).await {
            warn!(
                timeout_secs = timeout.as_secs(),
                "in-flight fetches still running at shutdown"
            );
        }
        runtime.shutdown_all().await;

        if let Err(e) = service.db.close().await {
            warn!(error = %e, "headline store did not close cleanly");
        }
        self.markers().remove();
        service.signals.cancel();
        self.set_state(ServiceState::Stopped);
        info!("herald service stopped");
        Ok(StopOutcome::Stopped)
    }

    /// Live status in-process, otherwise reconstructed from the markers.
    pub async fn status(&self) -> ServiceStatus {
        match self.running.lock().await.as_ref() {
            Some(service) => service.live.snapshot(),
            None => self.markers().external_status(),
        }
    }

    /// Runtime of the in-process service.
    pub async fn runtime(&self) -> Option<Arc<PluginRuntime>> {
        self.running
            .lock()
            .await
            .as_ref()
            .map(|s| s.live.runtime.clone())
    }

    /// Scheduler of the in-process service.
    pub async fn scheduler(&self) -> Option<Arc<Scheduler>> {
        self.running
            .lock()
            .await
            .as_ref()
            .map(|s| s.live.scheduler.clone())
    }
}

/// Stop the service named by `markers`: SIGTERM, wait up to `wait`, then SIGKILL.
pub async fn stop_external(markers: &Markers, wait: Duration) -> Result<StopOutcome, HeraldError> {
    let Some(pid) = markers.live_pid() else {
        return Ok(StopOutcome::NotRunning);
    };

    info!(pid, "sending SIGTERM");
    send_signal(pid, Signal::Terminate)?;
    let mut forced = false;
    if !wait_for_exit(pid, wait).await {
        warn!(pid, wait_secs = wait.as_secs(), "service did not exit in time; sending SIGKILL");
        send_signal(pid, Signal::Kill)?;
        forced = true;
        if !wait_for_exit(pid, Duration::from_secs(5)).await {
            return Err(HeraldError::Lifecycle(format!(
                "process {pid} survived SIGKILL"
            )));
        }
    }
    markers.remove();
    Ok(StopOutcome::Signalled { pid, forced })
}

async fn wait_for_exit(pid: u32, wait: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        if !process_alive(pid) {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(EXIT_POLL).await;
    }
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Terminate,
    Kill,
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: Signal) -> Result<(), HeraldError> {
    let raw_pid = libc::pid_t::try_from(pid)
        .map_err(|_| HeraldError::Lifecycle(format!("pid {pid} is out of range")))?;
    let raw_signal = match signal {
        Signal::Terminate => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    // SAFETY: kill(2) has no memory-safety preconditions.
    if unsafe { libc::kill(raw_pid, raw_signal) } == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        return Ok(());
    }
    Err(HeraldError::Lifecycle(format!(
        "cannot send {signal:?} to pid {pid}: {err}"
    )))
}

#[cfg(not(unix))]
fn send_signal(pid: u32, signal: Signal) -> Result<(), HeraldError> {
    Err(HeraldError::Lifecycle(format!(
        "cannot send {signal:?} to pid {pid}: unsupported on this platform"
    )))
}
