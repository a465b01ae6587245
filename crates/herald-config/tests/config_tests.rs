// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Herald configuration system.

use herald_config::diagnostic::ConfigError;
use herald_config::model::{HeraldConfig, ScorerMode};
use herald_config::{load_and_validate_str, load_config_from_str};
use herald_core::{RetentionPolicy, RuleField};
use serde_json::json;

/// Every section parses, including nested plugin tables.
#[test]
fn full_document_deserializes() {
    let toml = r#"
[service]
host = "0.0.0.0"
port = 9090
data_dir = "/var/lib/herald"
shutdown_timeout_secs = 5

[storage]
database_path = "/tmp/herald.db"

[feed]
title = "Morning Brief"
max_items = 20
important_only = true

[importance]
base_weight = 0.4
threshold = 0.8

[[importance.rules]]
pattern = "(?i)outage"
boost = 0.5
field = "title"

[scorer]
mode = "llm"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"
temperature = 0.0

[vault]
mirror_to_fallback = false

[watcher]
debounce_ms = 250

[preferences]
theme = "dark"
digest_hour = 7

[plugins.alpha]
enabled = true
schedule = "*/5 * * * *"

[plugins.alpha.config]
url = "https://example.com/rss"
max_items = 10

[plugins.alpha.importance]
threshold = 0.9
"#;

    let config = load_and_validate_str(toml).expect("valid document");
    assert_eq!(config.service.host, "0.0.0.0");
    assert_eq!(config.service.port, 9090);
    assert_eq!(config.database_path().to_str(), Some("/tmp/herald.db"));
    assert!(config.feed.important_only);
    assert_eq!(config.importance.rules[0].field, RuleField::Title);
    assert_eq!(config.scorer.mode, ScorerMode::Llm);
    assert!(!config.vault.mirror_to_fallback);
    assert_eq!(config.watcher.debounce_ms, 250);
    assert_eq!(config.preferences["digest_hour"], json!(7));

    let alpha = &config.plugins["alpha"];
    assert!(alpha.enabled);
    assert_eq!(alpha.config["url"], "https://example.com/rss");

    let params = config.importance_for("alpha");
    assert_eq!(params.threshold, 0.9);
    assert_eq!(params.base_weight, 0.4);
    assert_eq!(params.rules.len(), 1);

    let other = config.importance_for("beta");
    assert_eq!(other.threshold, 0.8);
}

/// An empty file is all defaults.
#[test]
fn empty_document_uses_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");
    assert_eq!(config, HeraldConfig::default());
    assert_eq!(config.service.port, 8787);
    assert_eq!(config.watcher.debounce_ms, 500);
    assert!(config.vault.mirror_to_fallback);
    assert!(config.plugins.is_empty());
    assert!(config.database_path().ends_with("herald.db"));
}

/// Unknown keys are reported with a suggestion.
#[test]
fn unknown_key_suggests_correction() {
    let errors = load_and_validate_str("[watcher]\ndebounce_sm = 100\n").unwrap_err();
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "debounce_sm");
            assert_eq!(suggestion.as_deref(), Some("debounce_ms"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

/// Unknown keys inside a plugin table are rejected too.
#[test]
fn unknown_plugin_key_is_rejected() {
    let errors = load_and_validate_str("[plugins.alpha]\nenabeld = true\n").unwrap_err();
    assert!(matches!(&errors[0], ConfigError::UnknownKey { key, .. } if key == "enabeld"));
}

/// Wrong types produce InvalidType.
#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[service]\nport = \"eighty\"\n").unwrap_err();
    assert!(matches!(&errors[0], ConfigError::InvalidType { .. }), "{errors:?}");
}

/// Semantic validation runs after parsing.
#[test]
fn semantic_errors_are_collected() {
    let toml = r#"
[importance]
threshold = 1.2

[plugins.alpha]
enabled = true
schedule = "whenever"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 2, "{errors:?}");
}

/// Round trip through the persisted form keeps the document intact.
#[test]
fn serialized_document_reparses() {
    let mut config = HeraldConfig::default();
    config.preferences.insert("theme".into(), json!("dark"));
    config.plugins.insert(
        "alpha".into(),
        herald_config::PluginSettings::enabled("0 * * * *", json!({"url": "https://x", "tags": ["a"]})),
    );
    let rendered = toml::to_string_pretty(&config).unwrap();
    let reparsed = load_and_validate_str(&rendered).unwrap();
    assert_eq!(reparsed, config);
}

/// Retention policies use the same tagged shape in TOML.
#[test]
fn retention_policy_parses_from_toml() {
    #[derive(serde::Deserialize)]
    struct Wrapper {
        retention: RetentionPolicy,
    }
    let w: Wrapper = toml::from_str("retention = { kind = \"duration\", hours = 24 }").unwrap();
    assert_eq!(w.retention, RetentionPolicy::Duration { hours: 24 });
}
