// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! The watched document is compiled defaults merged under one TOML file. The
//! CLI additionally layers `HERALD_*` environment variables on top for
//! process-level settings.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::HeraldConfig;

/// File name looked up in the working directory and the user config dir.
pub const CONFIG_FILE_NAME: &str = "herald.toml";

/// Pick the config file path.
///
/// An explicit path wins. Otherwise `./herald.toml` if it exists, else
/// `$XDG_CONFIG_HOME/herald/herald.toml` (which may not exist yet).
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    dirs::config_dir()
        .map(|d| d.join("herald").join(CONFIG_FILE_NAME))
        .unwrap_or(local)
}

/// Defaults merged with a TOML string.
pub fn load_config_from_str(toml_content: &str) -> Result<HeraldConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HeraldConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Defaults merged with one TOML file, without environment overrides.
///
/// This is the document the config manager persists and watches.
pub fn load_config_from_path(path: &Path) -> Result<HeraldConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HeraldConfig::default()))
        .merge(Toml::file(path))
        .extract()
}

/// Defaults, then the TOML file, then `HERALD_*` environment variables.
pub fn load_config_with_env(path: &Path) -> Result<HeraldConfig, figment::Error> {
    build_figment(path).extract()
}

/// The Figment used by [`load_config_with_env`], before extraction.
pub fn build_figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(HeraldConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
}

/// Environment provider mapping `HERALD_SECTION_KEY` to `section.key`.
///
/// Uses `Env::map()` rather than `Env::split("_")` because keys contain
/// underscores: `HERALD_SERVICE_DATA_DIR` is `service.data_dir`.
fn env_provider() -> Env {
    Env::prefixed("HERALD_").map(|key| {
        let key_str = key.as_str();
        let mapped = ["service", "storage", "feed", "importance", "scorer", "vault", "watcher"]
            .iter()
            .find_map(|section| {
                key_str
                    .strip_prefix(section)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .map(|rest| format!("{section}.{rest}"))
            })
            .unwrap_or_else(|| key_str.to_string());
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_map_to_sections() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("herald.toml", "[service]\nport = 9000\n")?;
            jail.set_env("HERALD_SERVICE_PORT", "9100");
            jail.set_env("HERALD_SERVICE_DATA_DIR", "/tmp/herald-env");
            jail.set_env("HERALD_SCORER_MAX_TOKENS", "64");

            let config = load_config_with_env(Path::new("herald.toml"))?;
            assert_eq!(config.service.port, 9100);
            assert_eq!(config.service.data_dir, "/tmp/herald-env");
            assert_eq!(config.scorer.max_tokens, 64);

            // The watched document ignores the environment.
            let file_only = load_config_from_path(Path::new("herald.toml"))?;
            assert_eq!(file_only.service.port, 9000);
            Ok(())
        });
    }

    #[test]
    fn explicit_path_wins() {
        let path = resolve_config_path(Some(Path::new("/etc/custom.toml")));
        assert_eq!(path, PathBuf::from("/etc/custom.toml"));
    }
}
