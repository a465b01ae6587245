// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Debounced file watcher that hot-reloads the configuration document.
//!
//! The parent directory is watched rather than the file itself so that
//! editors which save by rename are still observed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use herald_core::HeraldError;
use notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::manager::{ConfigManager, ReloadOutcome};
use crate::model::HeraldConfig;

/// Receives every accepted configuration change.
#[async_trait]
pub trait ConfigChangeHandler: Send + Sync + 'static {
    async fn on_config_change(&self, previous: Arc<HeraldConfig>, current: Arc<HeraldConfig>);
}

/// Forward accepted documents from `manager` to `handler` until cancelled.
///
/// Changes arriving while the handler runs are coalesced into one call that
/// diffs the last handled document against the newest.
pub fn spawn_change_listener(
    manager: &ConfigManager,
    handler: Arc<dyn ConfigChangeHandler>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let mut rx = manager.subscribe();
    let mut previous = rx.borrow_and_update().clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = rx.borrow_and_update().clone();
                    if current == previous {
                        continue;
                    }
                    handler.on_config_change(previous.clone(), current.clone()).await;
                    previous = current;
                }
            }
        }
        debug!("config change listener stopped");
    })
}

/// Watches the config file and calls [`ConfigManager::reload`] after a quiet window.
pub struct ConfigWatcher {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    _debouncer: Debouncer<notify::RecommendedWatcher>,
}

impl ConfigWatcher {
    /// Start watching `manager`'s file.
    pub fn start(manager: Arc<ConfigManager>, debounce: Duration) -> Result<Self, HeraldError> {
        let path = manager.path().to_path_buf();
        let file_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| HeraldError::Config(format!("`{}` is not a file path", path.display())))?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<DebounceEventResult>();
        let mut debouncer = new_debouncer(debounce, move |result: DebounceEventResult| {
            let _ = tx.send(result);
        })
        .map_err(|e| HeraldError::Config(format!("cannot create config watcher: {e}")))?;
        debouncer
            .watcher()
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| {
                HeraldError::Config(format!("cannot watch `{}`: {e}", dir.display()))
            })?;

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = rx.recv() => {
                        let Some(result) = event else { break };
                        match result {
                            Ok(events) => {
                                if events.iter().any(|e| e.path.file_name() == Some(file_name.as_os_str())) {
                                    handle_file_event(&manager, &path).await;
                                }
                            }
                            Err(e) => warn!(error = %e, "config watcher error"),
                        }
                    }
                }
            }
            debug!("config watcher stopped");
        });

        info!(
            dir = %dir.display(),
            debounce_ms = debounce.as_millis() as u64,
            "config watcher started"
        );
        Ok(Self {
            cancel,
            task,
            _debouncer: debouncer,
        })
    }

    /// Stop watching and wait for the event loop to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

async fn handle_file_event(manager: &Arc<ConfigManager>, path: &Path) {
    if !path.exists() {
        warn!(path = %path.display(), "config file removed; keeping last good configuration");
        return;
    }
    let manager = manager.clone();
    let outcome = tokio::task::spawn_blocking(move || manager.reload()).await;
    match outcome {
        Ok(Ok(ReloadOutcome::Changed { .. })) => {}
        Ok(Ok(ReloadOutcome::Unchanged)) => debug!("config file touched without changes"),
        Ok(Err(errors)) => {
            for error in &errors {
                warn!(error = %error, "invalid configuration");
            }
            warn!(
                count = errors.len(),
                "configuration reload rejected; keeping previous configuration"
            );
        }
        Err(e) => warn!(error = %e, "config reload task failed"),
    }
}
