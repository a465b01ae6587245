// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Herald feed curator.

use thiserror::Error;

/// The primary error type used across Herald crates.
///
/// Variants follow the failure taxonomy of the runtime: lookups that can never
/// succeed (`PluginNotFound`, `PluginNotEnabled`) are distinct from failures
/// inside a plugin (`PluginExecution`) so callers can decide whether a retry
/// makes sense.
#[derive(Debug, Error)]
pub enum HeraldError {
    /// Configuration errors (invalid TOML, out-of-range values, bad cron expressions).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        /// The underlying storage error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// No plugin with this id is loaded.
    #[error("plugin not found: {plugin_id}")]
    PluginNotFound {
        /// The requested plugin id.
        plugin_id: String,
    },

    /// The plugin is loaded but its runtime configuration is absent or disabled.
    #[error("plugin not enabled: {plugin_id}")]
    PluginNotEnabled {
        /// The plugin that is not enabled.
        plugin_id: String,
    },

    /// A plugin failed while initializing or fetching.
    #[error("plugin {plugin_id} failed: {message}")]
    PluginExecution {
        /// The plugin that failed.
        plugin_id: String,
        /// What went wrong, as recorded in the plugin's run-state.
        message: String,
    },

    /// A fetch for this plugin is already running; the trigger was coalesced.
    #[error("fetch already in progress for plugin {plugin_id}")]
    FetchInProgress {
        /// The plugin whose fetch is still running.
        plugin_id: String,
    },

    /// Credential vault errors. These trigger the fallback store, never a crash.
    #[error("vault error: {0}")]
    Vault(String),

    /// Importance scorer or text generation failures.
    #[error("scorer error: {0}")]
    Scorer(String),

    /// Process lifecycle errors (port in use, already running, stale markers).
    #[error("lifecycle error: {0}")]
    Lifecycle(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout {
        /// How long the operation was allowed to run.
        duration: std::time::Duration,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HeraldError {
    /// Build a plugin execution error.
    pub fn execution(plugin_id: impl Into<String>, message: impl Into<String>) -> Self {
        HeraldError::PluginExecution {
            plugin_id: plugin_id.into(),
            message: message.into(),
        }
    }

    /// Wrap any error as a storage error.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        HeraldError::Storage {
            source: Box::new(err),
        }
    }

    /// True for lookups that name a plugin the registry does not know.
    pub fn is_not_found(&self) -> bool {
        matches!(self, HeraldError::PluginNotFound { .. })
    }

    /// True when the plugin exists but is not enabled.
    pub fn is_not_enabled(&self) -> bool {
        matches!(self, HeraldError::PluginNotEnabled { .. })
    }

    /// True when a trigger was skipped because a fetch was already running.
    pub fn is_coalesced(&self) -> bool {
        matches!(self, HeraldError::FetchInProgress { .. })
    }
}
