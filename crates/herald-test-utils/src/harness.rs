// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness wiring a plugin runtime over a temporary headline store.

use std::sync::Arc;

use herald_config::{HeraldConfig, PluginSettings};
use herald_core::{HeadlineScorer, HeraldError, SourcePlugin};
use herald_plugin::{PluginOrigin, PluginRegistry, PluginRuntime};
use herald_storage::Database;
use herald_vault::{CredentialVault, SecretBackend};
use serde_json::Value;

use crate::mocks::{FixedScorer, MemoryBackend, MockTokenEndpoint};

/// Builder for [`TestHarness`].
pub struct TestHarnessBuilder {
    plugins: Vec<Arc<dyn SourcePlugin>>,
    config: HeraldConfig,
    scorer: Arc<dyn HeadlineScorer>,
    initialize: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            plugins: Vec::new(),
            config: HeraldConfig::default(),
            scorer: Arc::new(FixedScorer(0.5)),
            initialize: true,
        }
    }

    /// Register a plugin as a built-in.
    pub fn with_plugin(mut self, plugin: Arc<dyn SourcePlugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Enable `plugin_id` with a schedule and config payload.
    pub fn enable(mut self, plugin_id: &str, schedule: &str, config: Value) -> Self {
        self.config
            .plugins
            .insert(plugin_id.to_string(), PluginSettings::enabled(schedule, config));
        self
    }

    /// Replace the whole configuration document.
    pub fn with_config(mut self, config: HeraldConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn HeadlineScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Skip `initialize_all` during build.
    pub fn without_initialize(mut self) -> Self {
        self.initialize = false;
        self
    }

    pub async fn build(self) -> Result<TestHarness, HeraldError> {
        let temp_dir = tempfile::TempDir::new().map_err(HeraldError::storage)?;
        let db = Database::open(temp_dir.path().join("herald.db")).await?;

        let mut registry = PluginRegistry::new();
        for plugin in self.plugins {
            registry.register(plugin, PluginOrigin::Builtin)?;
        }

        let backend = Arc::new(MemoryBackend::new());
        let tokens = Arc::new(MockTokenEndpoint::new());
        let primary: Arc<dyn SecretBackend> = backend.clone();
        let vault = Arc::new(CredentialVault::new(Some(primary), db.clone(), tokens.clone()));

        let runtime = Arc::new(
            PluginRuntime::new(
                Arc::new(registry),
                db.clone(),
                self.scorer,
                Arc::new(self.config),
            )
            .with_vault(vault.clone()),
        );
        if self.initialize {
            runtime.initialize_all().await;
        }

        Ok(TestHarness {
            db,
            runtime,
            vault,
            backend,
            tokens,
            _temp_dir: temp_dir,
        })
    }
}

/// A runtime, vault, and store rooted in a temp directory removed on drop.
pub struct TestHarness {
    pub db: Database,
    pub runtime: Arc<PluginRuntime>,
    pub vault: Arc<CredentialVault>,
    /// Primary secret backend of the vault.
    pub backend: Arc<MemoryBackend>,
    pub tokens: Arc<MockTokenEndpoint>,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Directory holding the harness database.
    pub fn data_dir(&self) -> &std::path::Path {
        self._temp_dir.path()
    }
}
