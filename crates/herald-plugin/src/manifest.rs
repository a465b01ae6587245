// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `plugin.toml` manifests for external command plugins.
//!
//! Each subdirectory of the extension directory may hold one manifest:
//!
//! ```toml
//! [plugin]
//! id = "hn"
//! name = "Hacker News"
//! version = "0.1.0"
//! description = "Front page stories"
//! command = ["python3", "hn.py"]
//! timeout_secs = 30
//!
//! [plugin.retention]
//! kind = "count"
//! max_items = 100
//! ```

use std::path::{Path, PathBuf};

use herald_core::{AuthRequirement, ConfigSchema, HeraldError, PluginDescriptor, RetentionPolicy};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// File name looked up in every extension subdirectory.
pub const MANIFEST_FILE_NAME: &str = "plugin.toml";

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Longest `duration` retention window a manifest may declare (100 years).
pub const MAX_RETENTION_HOURS: u32 = 24 * 365 * 100;

/// Parsed manifest of an external command plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub id: String,
    pub name: String,
    pub version: String,
    pub author: Option<String>,
    pub description: String,
    /// Program followed by its arguments.
    pub command: Vec<String>,
    pub timeout_secs: u64,
    pub retention: RetentionPolicy,
    pub auth: Option<AuthRequirement>,
    pub config_schema: ConfigSchema,
}

impl PluginManifest {
    pub fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor {
            id: self.id.clone(),
            name: self.name.clone(),
            version: self.version.clone(),
            author: self.author.clone(),
            description: self.description.clone(),
            config_schema: self.config_schema.clone(),
            auth: self.auth.clone(),
            retention: self.retention,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PluginManifestFile {
    plugin: PluginSection,
}

#[derive(Debug, Deserialize)]
struct PluginSection {
    id: String,
    name: String,
    version: String,
    author: Option<String>,
    #[serde(default)]
    description: String,
    command: Vec<String>,
    timeout_secs: Option<u64>,
    retention: RetentionPolicy,
    auth: Option<AuthRequirement>,
    config_schema: Option<ConfigSchema>,
}

/// Parse a plugin manifest from TOML content.
///
/// `id`, `name`, `version`, `command` and `retention` are required. The
/// version must be valid semver and the id a lowercase slug.
pub fn parse_plugin_manifest(toml_content: &str) -> Result<PluginManifest, HeraldError> {
    let file: PluginManifestFile = toml::from_str(toml_content)
        .map_err(|e| HeraldError::Config(format!("invalid plugin manifest: {e}")))?;
    let section = file.plugin;

    if !herald_config::validation::is_valid_plugin_id(&section.id) {
        return Err(HeraldError::Config(format!(
            "plugin manifest: id '{}' may only contain lowercase letters, digits, `-` and `_`",
            section.id
        )));
    }
    if section.name.trim().is_empty() {
        return Err(HeraldError::Config(
            "plugin manifest: name must not be empty".to_string(),
        ));
    }
    semver::Version::parse(&section.version).map_err(|e| {
        HeraldError::Config(format!(
            "plugin manifest: version '{}' is not valid semver: {e}",
            section.version
        ))
    })?;
    if section.command.first().is_none_or(|program| program.trim().is_empty()) {
        return Err(HeraldError::Config(
            "plugin manifest: command must name a program".to_string(),
        ));
    }
    let timeout_secs = section.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(HeraldError::Config(
            "plugin manifest: timeout_secs must be greater than 0".to_string(),
        ));
    }
    if let RetentionPolicy::Duration { hours } = section.retention
        && !(1..=MAX_RETENTION_HOURS).contains(&hours)
    {
        return Err(HeraldError::Config(format!(
            "plugin manifest: retention hours must be between 1 and {MAX_RETENTION_HOURS}, got {hours}"
        )));
    }

    Ok(PluginManifest {
        id: section.id,
        name: section.name,
        version: section.version,
        author: section.author,
        description: section.description,
        command: section.command,
        timeout_secs,
        retention: section.retention,
        auth: section.auth,
        config_schema: section.config_schema.unwrap_or_else(ConfigSchema::object),
    })
}

/// A manifest found on disk, with the directory its command runs in.
#[derive(Debug, Clone)]
pub struct DiscoveredManifest {
    pub path: PathBuf,
    pub dir: PathBuf,
    pub manifest: PluginManifest,
}

/// Read every `<dir>/*/plugin.toml`, sorted by path.
///
/// Unreadable or invalid manifests are skipped with a warning. A missing
/// directory yields nothing.
pub fn discover_manifests(dir: &Path) -> Vec<DiscoveredManifest> {
    let read_dir = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "extension directory not readable");
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = read_dir
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.is_dir())
        .map(|p| p.join(MANIFEST_FILE_NAME))
        .filter(|p| p.is_file())
        .collect();
    paths.sort();

    let mut found = Vec::new();
    for path in paths {
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read plugin manifest; skipping");
                continue;
            }
        };
        match parse_plugin_manifest(&content) {
            Ok(manifest) => {
                let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
                found.push(DiscoveredManifest {
                    path,
                    dir,
                    manifest,
                });
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "rejected plugin manifest; skipping");
            }
        }
    }
    found
}
