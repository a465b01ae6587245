// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the plugin runtime, store, scheduler, and gateway.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

/// One unit of curated content as stored in the headline store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headline {
    pub id: String,
    pub plugin_id: String,
    pub title: String,
    pub description: Option<String>,
    pub link: Option<String>,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    /// Importance score in `0.0..=1.0`.
    pub importance: f64,
    pub importance_rationale: Option<String>,
    pub metadata: Value,
    pub read: bool,
    pub starred: bool,
    pub archived: bool,
}

/// A headline as produced by a plugin fetch, before id assignment and scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadlineDraft {
    /// Stable identifier from the source (RSS guid, API id), if any.
    #[serde(default)]
    pub guid: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Value,
}

impl HeadlineDraft {
    /// Create a draft with only a title set.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            guid: None,
            title: title.into(),
            description: None,
            link: None,
            published_at: None,
            category: None,
            tags: Vec::new(),
            metadata: Value::Null,
        }
    }

    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn with_guid(mut self, guid: impl Into<String>) -> Self {
        self.guid = Some(guid.into());
        self
    }

    /// The key used to derive a deterministic headline id.
    ///
    /// Prefers the source guid, then the link, then title plus publication time.
    pub fn stable_key(&self) -> String {
        if let Some(guid) = self.guid.as_deref().filter(|g| !g.trim().is_empty()) {
            return format!("guid:{guid}");
        }
        if let Some(link) = self.link.as_deref().filter(|l| !l.trim().is_empty()) {
            return format!("link:{link}");
        }
        let published = self
            .published_at
            .map(|p| p.timestamp_millis().to_string())
            .unwrap_or_default();
        format!("title:{}|{published}", self.title)
    }
}

/// Per-plugin rule governing which headlines survive after each fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Keep the `max_items` most recent headlines by publication time.
    Count { max_items: u32 },
    /// Keep headlines published within the last `hours`.
    Duration { hours: u32 },
    /// Keep everything.
    Unlimited,
}

impl std::fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetentionPolicy::Count { max_items } => write!(f, "count({max_items})"),
            RetentionPolicy::Duration { hours } => write!(f, "duration({hours}h)"),
            RetentionPolicy::Unlimited => write!(f, "unlimited"),
        }
    }
}

/// Authentication mechanism a plugin requires.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    #[strum(serialize = "oauth2")]
    #[serde(rename = "oauth2")]
    OAuth2,
    #[strum(serialize = "apikey")]
    #[serde(rename = "apikey")]
    ApiKey,
    Basic,
    Custom,
}

/// Declared authentication requirement of a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequirement {
    pub auth_type: AuthType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// Result of a plugin health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub message: String,
}

impl HealthReport {
    pub fn healthy(message: impl Into<String>) -> Self {
        Self {
            healthy: true,
            message: message.into(),
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: message.into(),
        }
    }
}

/// JSON type names accepted in a config schema property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl SchemaType {
    fn matches(self, value: &Value) -> bool {
        match self {
            SchemaType::String => value.is_string(),
            SchemaType::Number => value.is_number(),
            SchemaType::Integer => value.is_i64() || value.is_u64(),
            SchemaType::Boolean => value.is_boolean(),
            SchemaType::Array => value.is_array(),
            SchemaType::Object => value.is_object(),
        }
    }
}

/// A single property of a plugin config schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaProperty {
    #[serde(rename = "type")]
    pub property_type: SchemaType,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
}

impl SchemaProperty {
    pub fn new(property_type: SchemaType, description: impl Into<String>) -> Self {
        Self {
            property_type,
            description: description.into(),
            default: None,
            allowed: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_allowed(mut self, allowed: Vec<Value>) -> Self {
        self.allowed = Some(allowed);
        self
    }
}

/// Declared configuration schema of a plugin.
///
/// Serializes as `{type: "object", properties: {...}, required: [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSchema {
    #[serde(rename = "type", default = "object_type")]
    pub schema_type: String,
    #[serde(default)]
    pub properties: BTreeMap<String, SchemaProperty>,
    #[serde(default)]
    pub required: Vec<String>,
}

fn object_type() -> String {
    "object".to_string()
}

impl Default for ConfigSchema {
    fn default() -> Self {
        Self::object()
    }
}

impl ConfigSchema {
    /// An object schema with no properties.
    pub fn object() -> Self {
        Self {
            schema_type: object_type(),
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }

    /// Add a property, optionally marking it required.
    pub fn property(mut self, name: &str, property: SchemaProperty, required: bool) -> Self {
        self.properties.insert(name.to_string(), property);
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    /// Check a raw config payload against this schema.
    ///
    /// Unknown keys are allowed; plugins may accept more than they declare.
    pub fn validate(&self, raw: &Value) -> ConfigValidation {
        let mut errors = Vec::new();
        let empty = serde_json::Map::new();
        let object = match raw {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return ConfigValidation::invalid(vec![format!(
                    "config must be an object, got {}",
                    json_type_name(other)
                )]);
            }
        };

        for name in &self.required {
            if !object.contains_key(name) {
                errors.push(format!("missing required key `{name}`"));
            }
        }

        for (name, value) in object {
            let Some(property) = self.properties.get(name) else {
                continue;
            };
            if !property.property_type.matches(value) {
                errors.push(format!(
                    "`{name}` must be of type {:?}, got {}",
                    property.property_type,
                    json_type_name(value)
                ));
                continue;
            }
            if let Some(allowed) = &property.allowed {
                if !allowed.contains(value) {
                    errors.push(format!("`{name}` must be one of {allowed:?}"));
                }
            }
        }

        if errors.is_empty() {
            ConfigValidation::ok()
        } else {
            ConfigValidation::invalid(errors)
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Outcome of validating a plugin config payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ConfigValidation {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            valid: false,
            errors,
        }
    }
}

/// Static identity and declarations of a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config_schema: ConfigSchema,
    #[serde(default)]
    pub auth: Option<AuthRequirement>,
    pub retention: RetentionPolicy,
}

/// Everything a plugin receives when asked to fetch.
#[derive(Debug, Clone)]
pub struct FetchContext {
    pub plugin_id: String,
    pub config: Value,
    pub credential: Option<crate::credential::Credential>,
    pub last_run_at: Option<DateTime<Utc>>,
}

/// Which headline text a rule pattern is matched against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleField {
    Title,
    Description,
    #[default]
    Any,
}

/// A keyword/regex rule that adjusts a headline's importance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportanceRule {
    /// Case-insensitive regular expression.
    pub pattern: String,
    /// Added to the score when the pattern matches, in `-1.0..=1.0`.
    pub boost: f64,
    #[serde(default)]
    pub field: RuleField,
}

/// Resolved importance weighting for one plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportanceParams {
    pub base_weight: f64,
    pub threshold: f64,
    pub rules: Vec<ImportanceRule>,
}

/// A computed importance score with an optional explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Importance {
    pub score: f64,
    pub rationale: Option<String>,
}

impl Importance {
    /// Build an importance value, clamping the score into `0.0..=1.0`.
    pub fn new(score: f64, rationale: Option<String>) -> Self {
        let score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
        Self { score, rationale }
    }
}

/// Lifecycle state of the service process.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Aggregate plugin counts reported in service status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginCounts {
    pub loaded: usize,
    pub enabled: usize,
    pub initialized: usize,
    pub scheduled: usize,
}

/// Derived service status, live or reconstructed from the status marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub state: ServiceState,
    pub running: bool,
    pub pid: Option<u32>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub started_at: Option<DateTime<Utc>>,
    pub uptime_secs: Option<u64>,
    pub plugins: PluginCounts,
}

impl ServiceStatus {
    /// Status of a service that is not running anywhere.
    pub fn stopped() -> Self {
        Self {
            state: ServiceState::Stopped,
            running: false,
            pid: None,
            host: None,
            port: None,
            started_at: None,
            uptime_secs: None,
            plugins: PluginCounts::default(),
        }
    }
}
