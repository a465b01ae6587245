// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of loaded source plugins.
//!
//! The `PluginRegistry` maps plugin ids to shared [`SourcePlugin`] trait
//! objects. It is filled once at startup and read-only afterwards.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use herald_core::{HeraldError, PluginDescriptor, SourcePlugin};
use serde::Serialize;
use tracing::{debug, warn};

/// Where a registered plugin came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginOrigin {
    /// Compiled into the binary.
    Builtin,
    /// External command described by a `plugin.toml` manifest.
    Extension { manifest: String },
}

impl fmt::Display for PluginOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginOrigin::Builtin => write!(f, "builtin"),
            PluginOrigin::Extension { manifest } => write!(f, "extension ({manifest})"),
        }
    }
}

/// A single entry in the plugin registry.
#[derive(Clone)]
pub struct PluginEntry {
    pub plugin: Arc<dyn SourcePlugin>,
    pub origin: PluginOrigin,
}

impl fmt::Debug for PluginEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginEntry")
            .field("id", &self.plugin.id())
            .field("origin", &self.origin)
            .finish()
    }
}

/// Loaded plugins keyed by id.
#[derive(Default)]
pub struct PluginRegistry {
    entries: HashMap<String, PluginEntry>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin. The first registration of an id wins; later ones are
    /// rejected.
    pub fn register(
        &mut self,
        plugin: Arc<dyn SourcePlugin>,
        origin: PluginOrigin,
    ) -> Result<(), HeraldError> {
        let id = plugin.id().to_string();
        if let Some(existing) = self.entries.get(&id) {
            warn!(
                plugin_id = %id,
                existing = %existing.origin,
                rejected = %origin,
                "duplicate plugin id; keeping the first registration"
            );
            return Err(HeraldError::Config(format!(
                "plugin id `{id}` is already registered ({})",
                existing.origin
            )));
        }
        debug!(plugin_id = %id, origin = %origin, "plugin registered");
        self.entries.insert(id, PluginEntry { plugin, origin });
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn SourcePlugin>> {
        self.entries.get(id).map(|e| &e.plugin)
    }

    pub fn entry(&self, id: &str) -> Option<&PluginEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// All plugin ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// All entries, sorted by id.
    pub fn list_all(&self) -> Vec<&PluginEntry> {
        let mut entries: Vec<&PluginEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| a.plugin.id().cmp(b.plugin.id()));
        entries
    }

    pub fn descriptors(&self) -> Vec<&PluginDescriptor> {
        self.list_all()
            .into_iter()
            .map(|e| e.plugin.descriptor())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
