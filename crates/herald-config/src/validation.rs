// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks constraints serde cannot express: ranges, compilable regexes,
//! parseable cron schedules, and well-formed plugin ids. All problems are
//! collected rather than failing on the first.

use std::str::FromStr;

use croner::Cron;
use herald_core::ImportanceRule;
use serde_json::Value;

use crate::diagnostic::ConfigError;
use crate::model::HeraldConfig;

/// Validate a deserialized configuration.
pub fn validate_config(config: &HeraldConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.service.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("service.host must not be empty"));
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        errors.push(ConfigError::validation(format!(
            "service.host `{host}` is not a valid IP address or hostname"
        )));
    }

    if config.service.data_dir.trim().is_empty() {
        errors.push(ConfigError::validation("service.data_dir must not be empty"));
    }

    if config.service.shutdown_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "service.shutdown_timeout_secs must be greater than 0",
        ));
    }

    if let Some(path) = &config.storage.database_path
        && path.trim().is_empty()
    {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty when set",
        ));
    }

    let feed = &config.feed;
    if feed.max_items == 0 {
        errors.push(ConfigError::validation("feed.max_items must be greater than 0"));
    }
    if feed.default_page_size == 0 {
        errors.push(ConfigError::validation(
            "feed.default_page_size must be greater than 0",
        ));
    }
    if feed.default_page_size > feed.max_page_size {
        errors.push(ConfigError::validation(format!(
            "feed.default_page_size ({}) must not exceed feed.max_page_size ({})",
            feed.default_page_size, feed.max_page_size
        )));
    }

    validate_unit("importance.base_weight", config.importance.base_weight, &mut errors);
    validate_unit("importance.threshold", config.importance.threshold, &mut errors);
    validate_rules("importance.rules", &config.importance.rules, &mut errors);

    let scorer = &config.scorer;
    if !(0.0..=2.0).contains(&scorer.temperature) {
        errors.push(ConfigError::validation(format!(
            "scorer.temperature must be in [0, 2], got {}",
            scorer.temperature
        )));
    }
    if scorer.max_tokens == 0 {
        errors.push(ConfigError::validation("scorer.max_tokens must be greater than 0"));
    }
    if scorer.timeout_secs == 0 {
        errors.push(ConfigError::validation("scorer.timeout_secs must be greater than 0"));
    }
    if scorer.endpoint.trim().is_empty() {
        errors.push(ConfigError::validation("scorer.endpoint must not be empty"));
    }

    if config.vault.service_name.trim().is_empty() {
        errors.push(ConfigError::validation("vault.service_name must not be empty"));
    }

    if config.watcher.debounce_ms == 0 {
        errors.push(ConfigError::validation(
            "watcher.debounce_ms must be greater than 0",
        ));
    }

    for (id, settings) in &config.plugins {
        if !is_valid_plugin_id(id) {
            errors.push(ConfigError::validation(format!(
                "plugins.{id}: plugin ids may only contain lowercase letters, digits, `-` and `_`"
            )));
        }
        if let Err(e) = parse_schedule(&settings.schedule) {
            errors.push(ConfigError::validation(format!(
                "plugins.{id}.schedule `{}` is not a valid cron expression: {e}",
                settings.schedule
            )));
        }
        if !matches!(settings.config, Value::Object(_)) {
            errors.push(ConfigError::validation(format!(
                "plugins.{id}.config must be a table"
            )));
        }
        if let Some(overrides) = &settings.importance {
            if let Some(w) = overrides.base_weight {
                validate_unit(&format!("plugins.{id}.importance.base_weight"), w, &mut errors);
            }
            if let Some(t) = overrides.threshold {
                validate_unit(&format!("plugins.{id}.importance.threshold"), t, &mut errors);
            }
            if let Some(rules) = &overrides.rules {
                validate_rules(&format!("plugins.{id}.importance.rules"), rules, &mut errors);
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Parse a standard 5-field cron expression.
pub fn parse_schedule(expr: &str) -> Result<Cron, String> {
    Cron::from_str(expr.trim()).map_err(|e| e.to_string())
}

/// Plugin ids are lowercase ASCII slugs.
pub fn is_valid_plugin_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

fn validate_unit(key: &str, value: f64, errors: &mut Vec<ConfigError>) {
    if !(0.0..=1.0).contains(&value) {
        errors.push(ConfigError::validation(format!(
            "{key} must be in [0, 1], got {value}"
        )));
    }
}

fn validate_rules(key: &str, rules: &[ImportanceRule], errors: &mut Vec<ConfigError>) {
    for (i, rule) in rules.iter().enumerate() {
        if !(-1.0..=1.0).contains(&rule.boost) {
            errors.push(ConfigError::validation(format!(
                "{key}[{i}].boost must be in [-1, 1], got {}",
                rule.boost
            )));
        }
        if let Err(e) = regex::Regex::new(&rule.pattern) {
            errors.push(ConfigError::validation(format!(
                "{key}[{i}].pattern `{}` is not a valid regex: {e}",
                rule.pattern
            )));
        }
    }
}
