// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Herald feed curator.
//!
//! Provides the `herald.toml` model with strict validation
//! (`deny_unknown_fields`), layered loading, a [`ConfigManager`] that persists
//! mutations atomically, and a debounced [`ConfigWatcher`] for hot reload.
//!
//! # Usage
//!
//! ```no_run
//! use std::path::Path;
//! use herald_config::load_and_validate;
//!
//! let config = load_and_validate(Path::new("herald.toml")).expect("config errors");
//! println!("listening on {}:{}", config.service.host, config.service.port);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod manager;
pub mod model;
pub mod validation;
pub mod watcher;

use std::path::Path;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config_from_path, load_config_from_str, load_config_with_env, resolve_config_path};
pub use manager::{ConfigManager, ReloadOutcome};
pub use model::{HeraldConfig, PluginSettings};
pub use watcher::{ConfigChangeHandler, ConfigWatcher, spawn_change_listener};

/// Load `path` with `HERALD_*` environment overrides and validate it.
///
/// A missing file yields the compiled defaults.
pub fn load_and_validate(path: &Path) -> Result<HeraldConfig, Vec<ConfigError>> {
    match loader::load_config_with_env(path) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let content = std::fs::read_to_string(path).unwrap_or_default();
            let name = path.display().to_string();
            Err(diagnostic::figment_to_config_errors(
                err,
                Some((name.as_str(), content.as_str())),
            ))
        }
    }
}

/// Parse and validate a TOML string.
pub fn load_and_validate_str(toml_content: &str) -> Result<HeraldConfig, Vec<ConfigError>> {
    match loader::load_config_from_str(toml_content) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(
            err,
            Some(("<inline>", toml_content)),
        )),
    }
}
