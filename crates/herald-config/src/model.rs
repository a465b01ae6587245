// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Herald feed curator.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a typo in `herald.toml`
//! is rejected instead of silently ignored.

use std::collections::BTreeMap;
use std::path::PathBuf;

use herald_core::{ImportanceParams, ImportanceRule};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level Herald configuration document.
///
/// Every section is optional and defaults to sensible values, so an empty
/// file is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HeraldConfig {
    /// Process, HTTP listener, and marker file settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Headline store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Published feed settings.
    #[serde(default)]
    pub feed: FeedConfig,

    /// Global importance weighting.
    #[serde(default)]
    pub importance: ImportanceConfig,

    /// Importance scorer settings.
    #[serde(default)]
    pub scorer: ScorerConfig,

    /// Credential vault settings.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Config file watcher settings.
    #[serde(default)]
    pub watcher: WatcherConfig,

    /// Free-form user preferences.
    #[serde(default)]
    pub preferences: BTreeMap<String, Value>,

    /// Per-plugin runtime settings, keyed by plugin id.
    #[serde(default)]
    pub plugins: BTreeMap<String, PluginSettings>,
}

impl HeraldConfig {
    /// Resolve the importance parameters for a plugin, applying its overrides
    /// on top of the global section.
    pub fn importance_for(&self, plugin_id: &str) -> ImportanceParams {
        let global = &self.importance;
        let overrides = self
            .plugins
            .get(plugin_id)
            .and_then(|p| p.importance.as_ref());
        ImportanceParams {
            base_weight: overrides
                .and_then(|o| o.base_weight)
                .unwrap_or(global.base_weight),
            threshold: overrides
                .and_then(|o| o.threshold)
                .unwrap_or(global.threshold),
            rules: overrides
                .and_then(|o| o.rules.clone())
                .unwrap_or_else(|| global.rules.clone()),
        }
    }

    /// Absolute path of the headline database.
    pub fn database_path(&self) -> PathBuf {
        match &self.storage.database_path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(&self.service.data_dir).join("herald.db"),
        }
    }

    /// Ids of plugins with `enabled = true`, in id order.
    pub fn enabled_plugins(&self) -> impl Iterator<Item = (&str, &PluginSettings)> {
        self.plugins
            .iter()
            .filter(|(_, s)| s.enabled)
            .map(|(id, s)| (id.as_str(), s))
    }
}

/// Process and HTTP listener configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Address the HTTP listener binds to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the HTTP listener binds to. `0` picks a free port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding the PID and status markers (and the default database).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Upper bound on waiting for in-flight fetches during stop.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    /// Directory scanned for extension `plugin.toml` manifests.
    #[serde(default)]
    pub extensions_dir: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            extensions_dir: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|d| d.join("herald"))
        .unwrap_or_else(|| PathBuf::from(".herald"))
        .display()
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

/// Headline store configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// SQLite database path. Defaults to `<service.data_dir>/herald.db`.
    #[serde(default)]
    pub database_path: Option<String>,
}

/// Published RSS feed and headline listing configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FeedConfig {
    #[serde(default = "default_feed_title")]
    pub title: String,

    #[serde(default = "default_feed_link")]
    pub link: String,

    #[serde(default = "default_feed_description")]
    pub description: String,

    /// Maximum items in `feed.xml`.
    #[serde(default = "default_feed_max_items")]
    pub max_items: u32,

    /// Only publish headlines at or above the importance threshold.
    #[serde(default)]
    pub important_only: bool,

    /// Page size of `/api/headlines` when no limit is given.
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    /// Hard cap on `/api/headlines?limit=`.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            title: default_feed_title(),
            link: default_feed_link(),
            description: default_feed_description(),
            max_items: default_feed_max_items(),
            important_only: false,
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

fn default_feed_title() -> String {
    "Herald".to_string()
}

fn default_feed_link() -> String {
    "http://127.0.0.1:8787/".to_string()
}

fn default_feed_description() -> String {
    "Curated headlines".to_string()
}

fn default_feed_max_items() -> u32 {
    50
}

fn default_page_size() -> u32 {
    50
}

fn default_max_page_size() -> u32 {
    500
}

/// Global importance weighting.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ImportanceConfig {
    /// Score a headline starts from before rules apply, in `[0, 1]`.
    #[serde(default = "default_base_weight")]
    pub base_weight: f64,

    /// Score at or above which a headline counts as important, in `[0, 1]`.
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    #[serde(default)]
    pub rules: Vec<ImportanceRule>,
}

impl Default for ImportanceConfig {
    fn default() -> Self {
        Self {
            base_weight: default_base_weight(),
            threshold: default_threshold(),
            rules: Vec::new(),
        }
    }
}

fn default_base_weight() -> f64 {
    0.5
}

fn default_threshold() -> f64 {
    0.7
}

/// Per-plugin overrides of [`ImportanceConfig`]. Unset fields inherit the global value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ImportanceOverride {
    #[serde(default)]
    pub base_weight: Option<f64>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub rules: Option<Vec<ImportanceRule>>,
}

/// Which scoring strategy to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScorerMode {
    /// Keyword/regex rules only.
    #[default]
    Rules,
    /// LLM scoring with the rule engine as fallback.
    Llm,
}

/// Importance scorer configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScorerConfig {
    #[serde(default)]
    pub mode: ScorerMode,

    /// Base URL of an OpenAI-compatible API (OpenAI, Ollama).
    #[serde(default = "default_scorer_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_scorer_model")]
    pub model: String,

    /// API key. Prefer `api_key_env` to keep secrets out of the file.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_scorer_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            mode: ScorerMode::default(),
            endpoint: default_scorer_endpoint(),
            model: default_scorer_model(),
            api_key: None,
            api_key_env: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_scorer_timeout_secs(),
        }
    }
}

fn default_scorer_endpoint() -> String {
    "http://127.0.0.1:11434/v1".to_string()
}

fn default_scorer_model() -> String {
    "llama3.1".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    256
}

fn default_scorer_timeout_secs() -> u64 {
    20
}

/// Credential vault configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// Keyring service namespace.
    #[serde(default = "default_vault_service")]
    pub service_name: String,

    /// Use the OS keyring as primary. When false the store is used directly.
    #[serde(default = "default_true")]
    pub use_keyring: bool,

    /// Also write secret payloads to the store on primary writes, so they stay
    /// readable after the primary fails.
    #[serde(default = "default_true")]
    pub mirror_to_fallback: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            service_name: default_vault_service(),
            use_keyring: true,
            mirror_to_fallback: true,
        }
    }
}

fn default_vault_service() -> String {
    "herald".to_string()
}

fn default_true() -> bool {
    true
}

/// Config file watcher configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WatcherConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Quiet window before a burst of file events triggers a reload.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    500
}

/// Runtime settings of one plugin (`[plugins.<id>]`).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PluginSettings {
    #[serde(default)]
    pub enabled: bool,

    /// Standard 5-field cron expression, evaluated in UTC.
    #[serde(default = "default_schedule")]
    pub schedule: String,

    /// Opaque, plugin-specific configuration object.
    #[serde(default = "empty_object")]
    pub config: Value,

    #[serde(default)]
    pub importance: Option<ImportanceOverride>,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            schedule: default_schedule(),
            config: empty_object(),
            importance: None,
        }
    }
}

impl PluginSettings {
    /// Enabled settings with the given schedule and payload.
    pub fn enabled(schedule: impl Into<String>, config: Value) -> Self {
        Self {
            enabled: true,
            schedule: schedule.into(),
            config,
            importance: None,
        }
    }
}

fn default_schedule() -> String {
    "*/30 * * * *".to_string()
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}
