// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory configuration document with validated, synchronous persistence.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::diagnostic::{ConfigError, figment_to_config_errors};
use crate::loader::load_config_from_str;
use crate::model::{FeedConfig, HeraldConfig, ImportanceConfig, PluginSettings};
use crate::validation::validate_config;

/// Result of [`ConfigManager::reload`].
#[derive(Debug, Clone)]
pub enum ReloadOutcome {
    /// The file parsed and validated but matches the current document.
    Unchanged,
    /// A new document was accepted.
    Changed {
        previous: Arc<HeraldConfig>,
        current: Arc<HeraldConfig>,
    },
}

/// Owner of the configuration document.
///
/// Readers take cheap snapshots via [`current`](Self::current). Every accepted
/// change, whether from a reload or a mutating accessor, is published to
/// [`subscribe`](Self::subscribe)rs.
pub struct ConfigManager {
    path: PathBuf,
    current: ArcSwap<HeraldConfig>,
    write_lock: Mutex<()>,
    changes: watch::Sender<Arc<HeraldConfig>>,
}

impl ConfigManager {
    /// Load the document at `path`, writing a default one first if it is missing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Vec<ConfigError>> {
        let path = path.into();
        if !path.exists() {
            let defaults = HeraldConfig::default();
            persist(&path, &defaults)?;
            info!(path = %path.display(), "wrote default configuration");
        }
        let config = read_document(&path)?;
        Ok(Self::with_document(path, config))
    }

    /// Wrap an already-validated document without touching the filesystem.
    pub fn with_document(path: impl Into<PathBuf>, config: HeraldConfig) -> Self {
        let config = Arc::new(config);
        let (changes, _) = watch::channel(config.clone());
        Self {
            path: path.into(),
            current: ArcSwap::new(config),
            write_lock: Mutex::new(()),
            changes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the current document.
    pub fn current(&self) -> Arc<HeraldConfig> {
        self.current.load_full()
    }

    /// Receive every accepted document.
    pub fn subscribe(&self) -> watch::Receiver<Arc<HeraldConfig>> {
        self.changes.subscribe()
    }

    /// Re-read and validate the file. An invalid document is rejected and the
    /// previous one kept.
    pub fn reload(&self) -> Result<ReloadOutcome, Vec<ConfigError>> {
        let _guard = self.lock();
        let next = read_document(&self.path)?;
        let previous = self.current.load_full();
        if *previous == next {
            debug!("configuration reloaded without changes");
            return Ok(ReloadOutcome::Unchanged);
        }
        let current = Arc::new(next);
        self.publish(current.clone());
        info!(path = %self.path.display(), "configuration reloaded");
        Ok(ReloadOutcome::Changed { previous, current })
    }

    pub fn set_preference(&self, key: &str, value: Value) -> Result<(), Vec<ConfigError>> {
        let key = key.to_string();
        self.update(move |c| {
            c.preferences.insert(key, value);
        })
    }

    pub fn remove_preference(&self, key: &str) -> Result<(), Vec<ConfigError>> {
        self.update(|c| {
            c.preferences.remove(key);
        })
    }

    pub fn set_feed_config(&self, feed: FeedConfig) -> Result<(), Vec<ConfigError>> {
        self.update(move |c| c.feed = feed)
    }

    pub fn set_importance(&self, importance: ImportanceConfig) -> Result<(), Vec<ConfigError>> {
        self.update(move |c| c.importance = importance)
    }

    pub fn set_plugin_settings(
        &self,
        plugin_id: &str,
        settings: PluginSettings,
    ) -> Result<(), Vec<ConfigError>> {
        let plugin_id = plugin_id.to_string();
        self.update(move |c| {
            c.plugins.insert(plugin_id, settings);
        })
    }

    /// Flip a plugin's enabled flag, creating default settings if it has none.
    pub fn set_plugin_enabled(&self, plugin_id: &str, enabled: bool) -> Result<(), Vec<ConfigError>> {
        self.update(|c| {
            c.plugins.entry(plugin_id.to_string()).or_default().enabled = enabled;
        })
    }

    pub fn set_plugin_schedule(&self, plugin_id: &str, schedule: &str) -> Result<(), Vec<ConfigError>> {
        self.update(|c| {
            c.plugins.entry(plugin_id.to_string()).or_default().schedule = schedule.to_string();
        })
    }

    /// Validate, persist, then publish a mutated copy of the document.
    fn update(&self, mutate: impl FnOnce(&mut HeraldConfig)) -> Result<(), Vec<ConfigError>> {
        let _guard = self.lock();
        let mut next = HeraldConfig::clone(&self.current.load());
        mutate(&mut next);
        validate_config(&next)?;
        persist(&self.path, &next)?;
        self.publish(Arc::new(next));
        Ok(())
    }

    fn publish(&self, config: Arc<HeraldConfig>) {
        self.current.store(config.clone());
        self.changes.send_replace(config);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        // The guarded data is `()`, so a poisoned lock carries no broken state.
        self.write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Read, parse, and validate the document at `path`.
pub fn read_document(path: &Path) -> Result<HeraldConfig, Vec<ConfigError>> {
    let content = std::fs::read_to_string(path).map_err(|e| vec![io_error(path, e)])?;
    let config = load_config_from_str(&content).map_err(|err| {
        figment_to_config_errors(err, Some((&path.display().to_string(), &content)))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Write the document atomically: temp file in the same directory, then rename.
fn persist(path: &Path, config: &HeraldConfig) -> Result<(), Vec<ConfigError>> {
    let rendered = toml::to_string_pretty(config)
        .map_err(|e| vec![ConfigError::Other(format!("cannot serialize configuration: {e}"))])?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| vec![io_error(&dir, e)])?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| vec![io_error(&dir, e)])?;
    tmp.write_all(rendered.as_bytes())
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| vec![io_error(tmp.path(), e)])?;
    tmp.persist(path).map_err(|e| vec![io_error(path, e.error)])?;
    debug!(path = %path.display(), "configuration persisted");
    Ok(())
}

fn io_error(path: &Path, e: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}
