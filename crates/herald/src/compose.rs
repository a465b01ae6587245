// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Construction of the store, vault, scorer, and plugin runtime.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use herald_config::HeraldConfig;
use herald_core::HeraldError;
use herald_plugin::{PluginRegistry, PluginRuntime, default_http_client, load_registry};
use herald_scoring::build_scorer;
use herald_storage::Database;
use herald_vault::{CredentialVault, HttpTokenEndpoint, KeyringBackend, SecretBackend};
use tracing::info;

const TOKEN_ENDPOINT_TIMEOUT: Duration = Duration::from_secs(30);

/// Built-in plugins plus the configured extension directory.
pub fn default_registry(config: &HeraldConfig) -> Result<PluginRegistry, HeraldError> {
    let extensions = config.service.extensions_dir.as_deref().map(Path::new);
    load_registry(extensions, default_http_client()?)
}

/// Store, vault, and runtime sharing one database handle.
pub struct Components {
    pub db: Database,
    pub vault: Arc<CredentialVault>,
    pub runtime: Arc<PluginRuntime>,
}

/// Open the store and wire an uninitialized runtime over `registry`.
pub async fn open_components(
    config: Arc<HeraldConfig>,
    registry: Arc<PluginRegistry>,
) -> Result<Components, HeraldError> {
    let db = Database::open(config.database_path()).await?;

    let primary: Option<Arc<dyn SecretBackend>> = if config.vault.use_keyring {
        Some(Arc::new(KeyringBackend::new(&config.vault.service_name)))
    } else {
        None
    };
    let tokens = Arc::new(HttpTokenEndpoint::new(TOKEN_ENDPOINT_TIMEOUT)?);
    let vault = Arc::new(
        CredentialVault::new(primary, db.clone(), tokens)
            .with_mirror(config.vault.mirror_to_fallback),
    );

    let scorer = build_scorer(&config.scorer)?;
    info!(mode = ?config.scorer.mode, keyring = config.vault.use_keyring, "components ready");

    let runtime = Arc::new(
        PluginRuntime::new(registry, db.clone(), scorer, config).with_vault(vault.clone()),
    );
    Ok(Components { db, vault, runtime })
}
