// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assembly of the plugin registry from built-ins and the extension directory.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use herald_core::{HeraldError, SourcePlugin};
use tracing::{debug, info};

use crate::builtin::rss::RssPlugin;
use crate::command::CommandPlugin;
use crate::manifest::discover_manifests;
use crate::registry::{PluginOrigin, PluginRegistry};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client shared by built-in plugins.
pub fn default_http_client() -> Result<reqwest::Client, HeraldError> {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(concat!("herald/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| HeraldError::Internal(format!("failed to build HTTP client: {e}")))
}

/// Every plugin compiled into the binary.
pub fn builtin_plugins(client: reqwest::Client) -> Vec<Arc<dyn SourcePlugin>> {
    vec![Arc::new(RssPlugin::new(client))]
}

/// Register the built-ins, then every valid manifest under `extensions_dir`.
///
/// Built-ins are registered first, so an extension cannot shadow one.
pub fn load_registry(
    extensions_dir: Option<&Path>,
    client: reqwest::Client,
) -> Result<PluginRegistry, HeraldError> {
    let mut registry = PluginRegistry::new();
    for plugin in builtin_plugins(client) {
        registry.register(plugin, PluginOrigin::Builtin)?;
    }

    if let Some(dir) = extensions_dir {
        for found in discover_manifests(dir) {
            let origin = PluginOrigin::Extension {
                manifest: found.path.display().to_string(),
            };
            let plugin: Arc<dyn SourcePlugin> = Arc::new(CommandPlugin::from_discovered(&found));
            if let Err(e) = registry.register(plugin, origin) {
                debug!(error = %e, "extension not registered");
            }
        }
    }

    info!(plugins = registry.len(), ids = ?registry.ids(), "plugin registry loaded");
    Ok(registry)
}
