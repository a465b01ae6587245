// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The plugin runtime: lifecycle, guarded fetch pipeline, and hot reload.
//!
//! Every fetch and every lifecycle transition of a plugin holds that plugin's
//! in-flight slot, so a plugin is never fetched while it is being shut down or
//! reinitialized, and never fetched twice at once. Triggers that find the slot
//! taken are coalesced into [`HeraldError::FetchInProgress`].
//!
//! A fetch hands the plugin the config it was last initialized with, not the
//! newest snapshot, so new settings reach a plugin only through reinitialize.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::join_all;
use herald_config::{HeraldConfig, PluginSettings};
use herald_core::{
    AuthType, Credential, FetchContext, Headline, HeadlineDraft, HeadlineScorer, HealthReport,
    HeraldError, Importance, PluginCounts, RetentionPolicy, SourcePlugin,
};
use herald_storage::Database;
use herald_storage::queries::{headlines, plugin_state};
use herald_vault::CredentialVault;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::reconcile::ReloadAction;
use crate::registry::PluginRegistry;

/// Outcome of one successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchReport {
    pub plugin_id: String,
    /// Drafts returned by the plugin.
    pub fetched: usize,
    pub inserted: usize,
    /// Drafts whose headline id was already stored.
    pub duplicates: usize,
    /// Drafts dropped for having a blank title.
    pub skipped: usize,
    /// Headlines deleted by the retention sweep.
    pub removed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Per-plugin result of [`PluginRuntime::fetch_all`].
#[derive(Debug)]
pub struct PluginFetchOutcome {
    pub plugin_id: String,
    pub result: Result<FetchReport, HeraldError>,
}

/// What [`PluginRuntime::apply_reload`] did.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ReloadReport {
    pub applied: Vec<ReloadAction>,
    /// `(plugin_id, error)` for lifecycle actions that failed.
    pub failed: Vec<(String, String)>,
}

/// Listing entry for a loaded plugin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginSummary {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub origin: String,
    pub enabled: bool,
    pub initialized: bool,
    pub fetching: bool,
    pub schedule: Option<String>,
    pub retention: RetentionPolicy,
    pub auth: Option<AuthType>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub run_count: u64,
    pub error_count: u64,
}

pub struct PluginRuntime {
    registry: Arc<PluginRegistry>,
    db: Database,
    scorer: Arc<dyn HeadlineScorer>,
    vault: Option<Arc<CredentialVault>>,
    config: ArcSwap<HeraldConfig>,
    /// Initialized plugins and the config each was initialized with.
    initialized: Mutex<HashMap<String, Value>>,
    in_flight: DashMap<String, DateTime<Utc>>,
    idle: Notify,
}

/// Releases a plugin's in-flight slot on drop.
struct InFlightGuard<'a> {
    runtime: &'a PluginRuntime,
    plugin_id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.runtime.in_flight.remove(&self.plugin_id);
        self.runtime.idle.notify_waiters();
    }
}

impl PluginRuntime {
    pub fn new(
        registry: Arc<PluginRegistry>,
        db: Database,
        scorer: Arc<dyn HeadlineScorer>,
        config: Arc<HeraldConfig>,
    ) -> Self {
        Self {
            registry,
            db,
            scorer,
            vault: None,
            config: ArcSwap::new(config),
            initialized: Mutex::new(HashMap::new()),
            in_flight: DashMap::new(),
            idle: Notify::new(),
        }
    }

    /// Resolve credentials for plugins that declare an auth requirement.
    pub fn with_vault(mut self, vault: Arc<CredentialVault>) -> Self {
        self.vault = Some(vault);
        self
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Snapshot of the configuration the runtime is working from.
    pub fn config(&self) -> Arc<HeraldConfig> {
        self.config.load_full()
    }

    /// Replace the configuration snapshot without any lifecycle actions.
    pub fn set_config(&self, config: Arc<HeraldConfig>) {
        self.config.store(config);
    }

    pub fn is_loaded(&self, plugin_id: &str) -> bool {
        self.registry.contains(plugin_id)
    }

    pub fn is_initialized(&self, plugin_id: &str) -> bool {
        self.initialized_set().contains_key(plugin_id)
    }

    pub fn is_fetching(&self, plugin_id: &str) -> bool {
        self.in_flight.contains_key(plugin_id)
    }

    /// Aggregate counts; `scheduled` comes from the scheduler.
    pub fn counts(&self, scheduled: usize) -> PluginCounts {
        let config = self.config.load();
        PluginCounts {
            loaded: self.registry.len(),
            enabled: config
                .enabled_plugins()
                .filter(|(id, _)| self.registry.contains(id))
                .count(),
            initialized: self.initialized_set().len(),
            scheduled,
        }
    }

    fn initialized_set(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        // Only plain inserts and removes happen under this lock.
        self.initialized
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn try_acquire(&self, plugin_id: &str) -> Option<InFlightGuard<'_>> {
        match self.in_flight.entry(plugin_id.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(Utc::now());
                Some(InFlightGuard {
                    runtime: self,
                    plugin_id: plugin_id.to_string(),
                })
            }
        }
    }

    /// Wait for the plugin's slot to free up, then take it.
    async fn acquire(&self, plugin_id: &str) -> InFlightGuard<'_> {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(guard) = self.try_acquire(plugin_id) {
                return guard;
            }
            debug!(plugin_id, "waiting for in-flight fetch before lifecycle change");
            notified.await;
        }
    }

    /// Wait until no fetch is in flight. Returns false on timeout.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let idle = async {
            loop {
                let notified = self.idle.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.in_flight.is_empty() {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, idle).await.is_ok()
    }

    /// Initialize every enabled plugin. Returns how many succeeded.
    ///
    /// Enabled settings that name no loaded plugin are warned about and skipped.
    pub async fn initialize_all(&self) -> usize {
        let config = self.config.load_full();
        let mut initialized = 0;
        for (id, settings) in config.enabled_plugins() {
            let Some(plugin) = self.registry.get(id).cloned() else {
                warn!(plugin_id = id, "enabled plugin is not loaded; skipping");
                continue;
            };
            let _guard = self.acquire(id).await;
            if self.initialize_plugin(&plugin, settings).await.is_ok() {
                initialized += 1;
            }
        }
        info!(initialized, "plugins initialized");
        initialized
    }

    /// Shut down every initialized plugin.
    pub async fn shutdown_all(&self) {
        let ids: Vec<String> = self.initialized_set().keys().cloned().collect();
        for id in ids {
            if let Some(plugin) = self.registry.get(&id).cloned() {
                self.shutdown_plugin(&plugin).await;
            }
        }
        info!("plugins shut down");
    }

    async fn initialize_plugin(
        &self,
        plugin: &Arc<dyn SourcePlugin>,
        settings: &PluginSettings,
    ) -> Result<(), HeraldError> {
        let id = plugin.id();
        let validation = plugin.validate_config(&settings.config);
        let result = if validation.valid {
            plugin
                .initialize(&settings.config)
                .await
                .map_err(|e| as_execution(id, e))
        } else {
            Err(HeraldError::execution(
                id,
                format!("invalid configuration: {}", validation.errors.join("; ")),
            ))
        };

        match result {
            Ok(()) => {
                self.initialized_set()
                    .insert(id.to_string(), settings.config.clone());
                info!(plugin_id = id, "plugin initialized");
                Ok(())
            }
            Err(e) => {
                warn!(plugin_id = id, error = %e, "plugin initialization failed");
                self.record_failure(id, &e).await;
                Err(e)
            }
        }
    }

    async fn shutdown_plugin(&self, plugin: &Arc<dyn SourcePlugin>) {
        let id = plugin.id();
        let was_initialized = self.initialized_set().remove(id).is_some();
        if !was_initialized {
            return;
        }
        match plugin.shutdown().await {
            Ok(()) => info!(plugin_id = id, "plugin shut down"),
            Err(e) => warn!(plugin_id = id, error = %e, "plugin shutdown failed"),
        }
    }

    /// Fetch one plugin: credential, fetch, score, persist, retention, run-state.
    ///
    /// Fails with `PluginNotFound` or `PluginNotEnabled` before touching
    /// anything, and with `FetchInProgress` when a fetch is already running.
    pub async fn fetch_one(&self, plugin_id: &str) -> Result<FetchReport, HeraldError> {
        let plugin = self
            .registry
            .get(plugin_id)
            .cloned()
            .ok_or_else(|| HeraldError::PluginNotFound {
                plugin_id: plugin_id.to_string(),
            })?;
        let config = self.config.load_full();
        if !config.plugins.get(plugin_id).is_some_and(|s| s.enabled) {
            return Err(HeraldError::PluginNotEnabled {
                plugin_id: plugin_id.to_string(),
            });
        }

        let Some(_guard) = self.try_acquire(plugin_id) else {
            info!(plugin_id, "fetch already in progress; trigger coalesced");
            return Err(HeraldError::FetchInProgress {
                plugin_id: plugin_id.to_string(),
            });
        };

        let started_at = Utc::now();
        match self.run_fetch(&plugin, &config, started_at).await {
            Ok(report) => {
                if let Err(e) = plugin_state::record_success(&self.db, plugin_id, report.finished_at).await {
                    warn!(plugin_id, error = %e, "failed to record run state");
                }
                info!(
                    plugin_id,
                    fetched = report.fetched,
                    inserted = report.inserted,
                    duplicates = report.duplicates,
                    removed = report.removed,
                    "fetch complete"
                );
                Ok(report)
            }
            Err(e) => {
                warn!(plugin_id, error = %e, "fetch failed");
                self.record_failure(plugin_id, &e).await;
                Err(e)
            }
        }
    }

    async fn run_fetch(
        &self,
        plugin: &Arc<dyn SourcePlugin>,
        config: &HeraldConfig,
        started_at: DateTime<Utc>,
    ) -> Result<FetchReport, HeraldError> {
        let plugin_id = plugin.id();
        let Some(plugin_config) = self.initialized_set().get(plugin_id).cloned() else {
            return Err(HeraldError::execution(plugin_id, "plugin is not initialized"));
        };

        let credential = self.resolve_credential(plugin.as_ref()).await?;
        let last_run_at = plugin_state::get_run_state(&self.db, plugin_id)
            .await?
            .and_then(|s| s.last_run_at);
        let ctx = FetchContext {
            plugin_id: plugin_id.to_string(),
            config: plugin_config,
            credential,
            last_run_at,
        };

        let drafts = plugin
            .fetch(&ctx)
            .await
            .map_err(|e| as_execution(plugin_id, e))?;
        let fetched = drafts.len();

        let params = config.importance_for(plugin_id);
        let now = Utc::now();
        let mut batch = Vec::with_capacity(fetched);
        let mut skipped = 0;
        for draft in drafts {
            if draft.title.trim().is_empty() {
                skipped += 1;
                continue;
            }
            let importance = self.scorer.score(&draft, &params).await;
            batch.push(build_headline(plugin_id, draft, importance, now));
        }
        if skipped > 0 {
            warn!(plugin_id, skipped, "dropped drafts without a title");
        }

        let outcome = headlines::insert_headlines(&self.db, batch).await?;
        let removed =
            headlines::apply_retention(&self.db, plugin_id, plugin.retention_policy(), now).await?;

        Ok(FetchReport {
            plugin_id: plugin_id.to_string(),
            fetched,
            inserted: outcome.inserted,
            duplicates: outcome.duplicates,
            skipped,
            removed,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn resolve_credential(
        &self,
        plugin: &dyn SourcePlugin,
    ) -> Result<Option<Credential>, HeraldError> {
        let plugin_id = plugin.id();
        let Some(requirement) = plugin.auth_requirement() else {
            return Ok(None);
        };
        let Some(vault) = &self.vault else {
            return Err(HeraldError::execution(
                plugin_id,
                format!("requires {} credentials but no vault is configured", requirement.auth_type),
            ));
        };
        match vault.validate(plugin_id).await {
            Ok(Some(credential)) => {
                if credential.auth_type() != requirement.auth_type {
                    warn!(
                        plugin_id,
                        expected = %requirement.auth_type,
                        stored = %credential.auth_type(),
                        "stored credential type differs from the declared requirement"
                    );
                }
                Ok(Some(credential))
            }
            Ok(None) => Err(HeraldError::execution(
                plugin_id,
                format!("no {} credential available", requirement.auth_type),
            )),
            Err(e) => Err(HeraldError::execution(
                plugin_id,
                format!("credential lookup failed: {e}"),
            )),
        }
    }

    async fn record_failure(&self, plugin_id: &str, error: &HeraldError) {
        let message = match error {
            HeraldError::PluginExecution { message, .. } => message.clone(),
            other => other.to_string(),
        };
        if let Err(e) = plugin_state::record_failure(&self.db, plugin_id, Utc::now(), &message).await {
            warn!(plugin_id, error = %e, "failed to record run state");
        }
    }

    /// Fetch every enabled plugin in id order. One failure never stops the batch.
    pub async fn fetch_all(&self) -> Vec<PluginFetchOutcome> {
        let config = self.config.load_full();
        let mut outcomes = Vec::new();
        for (plugin_id, _) in config.enabled_plugins() {
            let result = self.fetch_one(plugin_id).await;
            outcomes.push(PluginFetchOutcome {
                plugin_id: plugin_id.to_string(),
                result,
            });
        }
        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        info!(total = outcomes.len(), failed, "fetch-all complete");
        outcomes
    }

    /// Adopt `config` and run the lifecycle actions of `plan`.
    ///
    /// Timer actions are ignored here. Plugins are handled concurrently, so a
    /// plugin waiting for its in-flight fetch does not hold up the others. Each
    /// plugin's failure is recorded and does not stop the others.
    pub async fn apply_reload(&self, config: Arc<HeraldConfig>, plan: &[ReloadAction]) -> ReloadReport {
        self.config.store(config.clone());

        let lifecycle = plan.iter().filter(|a| !a.is_timer_action());
        let results = join_all(lifecycle.map(|action| self.apply_action(&config, action))).await;

        let mut report = ReloadReport::default();
        for (action, result) in results.into_iter().flatten() {
            match result {
                Ok(()) => report.applied.push(action.clone()),
                Err(e) => report
                    .failed
                    .push((action.plugin_id().to_string(), e.to_string())),
            }
        }

        if !report.applied.is_empty() || !report.failed.is_empty() {
            info!(
                applied = report.applied.len(),
                failed = report.failed.len(),
                "plugin reload applied"
            );
        }
        report
    }

    async fn apply_action<'a>(
        &self,
        config: &HeraldConfig,
        action: &'a ReloadAction,
    ) -> Option<(&'a ReloadAction, Result<(), HeraldError>)> {
        let plugin_id = action.plugin_id();
        let plugin = self.registry.get(plugin_id).cloned()?;
        let _guard = self.acquire(plugin_id).await;
        let result = match action {
            ReloadAction::Initialize { .. } | ReloadAction::Reinitialize { .. } => {
                match config.plugins.get(plugin_id).filter(|s| s.enabled) {
                    Some(settings) => {
                        self.shutdown_plugin(&plugin).await;
                        self.initialize_plugin(&plugin, settings).await
                    }
                    None => Ok(()),
                }
            }
            ReloadAction::Shutdown { .. } => {
                self.shutdown_plugin(&plugin).await;
                Ok(())
            }
            _ => Ok(()),
        };
        Some((action, result))
    }

    /// Shut down and reinitialize one plugin with its current settings.
    pub async fn reload_plugin(&self, plugin_id: &str) -> Result<(), HeraldError> {
        let plugin = self
            .registry
            .get(plugin_id)
            .cloned()
            .ok_or_else(|| HeraldError::PluginNotFound {
                plugin_id: plugin_id.to_string(),
            })?;
        let config = self.config.load_full();
        let settings = config
            .plugins
            .get(plugin_id)
            .filter(|s| s.enabled)
            .ok_or_else(|| HeraldError::PluginNotEnabled {
                plugin_id: plugin_id.to_string(),
            })?;

        let _guard = self.acquire(plugin_id).await;
        self.shutdown_plugin(&plugin).await;
        self.initialize_plugin(&plugin, settings).await
    }

    /// Ask a loaded plugin for its health.
    pub async fn health(&self, plugin_id: &str) -> Result<HealthReport, HeraldError> {
        let plugin = self
            .registry
            .get(plugin_id)
            .cloned()
            .ok_or_else(|| HeraldError::PluginNotFound {
                plugin_id: plugin_id.to_string(),
            })?;
        Ok(plugin.health_check().await)
    }

    /// Listing of every loaded plugin with its settings and run-state.
    pub async fn summaries(&self) -> Result<Vec<PluginSummary>, HeraldError> {
        let config = self.config.load_full();
        let states = plugin_state::list_run_states(&self.db).await?;
        let summaries = self
            .registry
            .list_all()
            .into_iter()
            .map(|entry| {
                let descriptor = entry.plugin.descriptor();
                let id = descriptor.id.as_str();
                let settings = config.plugins.get(id);
                let state = states.iter().find(|s| s.plugin_id == id);
                PluginSummary {
                    id: id.to_string(),
                    name: descriptor.name.clone(),
                    version: descriptor.version.clone(),
                    description: descriptor.description.clone(),
                    origin: entry.origin.to_string(),
                    enabled: settings.is_some_and(|s| s.enabled),
                    initialized: self.is_initialized(id),
                    fetching: self.is_fetching(id),
                    schedule: settings.map(|s| s.schedule.clone()),
                    retention: entry.plugin.retention_policy(),
                    auth: entry.plugin.auth_requirement().map(|a| a.auth_type),
                    last_run_at: state.and_then(|s| s.last_run_at),
                    last_success_at: state.and_then(|s| s.last_success_at),
                    last_error: state.and_then(|s| s.last_error.clone()),
                    run_count: state.map_or(0, |s| s.run_count),
                    error_count: state.map_or(0, |s| s.error_count),
                }
            })
            .collect();
        Ok(summaries)
    }
}

fn as_execution(plugin_id: &str, error: HeraldError) -> HeraldError {
    match error {
        e @ HeraldError::PluginExecution { .. } => e,
        other => HeraldError::execution(plugin_id, other.to_string()),
    }
}

/// Deterministic headline id: SHA-256 over the plugin id and the draft's stable key.
pub fn headline_id(plugin_id: &str, draft: &HeadlineDraft) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plugin_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(draft.stable_key().as_bytes());
    hex::encode(hasher.finalize())
}

fn build_headline(
    plugin_id: &str,
    draft: HeadlineDraft,
    importance: Importance,
    now: DateTime<Utc>,
) -> Headline {
    Headline {
        id: headline_id(plugin_id, &draft),
        plugin_id: plugin_id.to_string(),
        title: draft.title.trim().to_string(),
        description: draft.description,
        link: draft.link,
        published_at: draft.published_at.unwrap_or(now),
        created_at: now,
        category: draft.category,
        tags: draft.tags,
        importance: importance.score,
        importance_rationale: importance.rationale,
        metadata: draft.metadata,
        read: false,
        starred: false,
        archived: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headline_id_is_stable_and_plugin_scoped() {
        let draft = HeadlineDraft::new("Hello").with_guid("g-1");
        let a = headline_id("alpha", &draft);
        assert_eq!(a, headline_id("alpha", &draft.clone().with_link("https://elsewhere")));
        assert_ne!(a, headline_id("beta", &draft));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn build_headline_defaults_publication_time() {
        let now = Utc::now();
        let headline = build_headline(
            "alpha",
            HeadlineDraft::new("  Spaced  "),
            Importance::new(0.8, Some("rule".into())),
            now,
        );
        assert_eq!(headline.title, "Spaced");
        assert_eq!(headline.published_at, now);
        assert_eq!(headline.importance, 0.8);
        assert!(!headline.read && !headline.starred && !headline.archived);
    }

    #[test]
    fn execution_errors_pass_through_others_are_wrapped() {
        let e = as_execution("a", HeraldError::execution("a", "boom"));
        assert_eq!(e.to_string(), "plugin a failed: boom");
        let e = as_execution("a", HeraldError::Internal("oops".into()));
        assert!(matches!(e, HeraldError::PluginExecution { .. }));
    }
}
