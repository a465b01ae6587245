// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The contract every data-source plugin satisfies.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::HeraldError;
use crate::types::{
    AuthRequirement, ConfigSchema, ConfigValidation, FetchContext, HeadlineDraft, HealthReport,
    PluginDescriptor, RetentionPolicy,
};

/// A pluggable source of headlines.
///
/// Plugins are shared behind `Arc` and may hold interior state set up by
/// [`initialize`](SourcePlugin::initialize). The runtime guarantees at most one
/// `fetch` in flight per plugin and never calls `initialize` twice without a
/// `shutdown` in between.
#[async_trait]
pub trait SourcePlugin: Send + Sync + 'static {
    /// Static identity and declarations.
    fn descriptor(&self) -> &PluginDescriptor;

    /// Prepare the plugin with its validated configuration payload.
    async fn initialize(&self, config: &Value) -> Result<(), HeraldError>;

    /// Release anything acquired in `initialize`.
    async fn shutdown(&self) -> Result<(), HeraldError>;

    /// Retrieve the current batch of items from the source.
    async fn fetch(&self, ctx: &FetchContext) -> Result<Vec<HeadlineDraft>, HeraldError>;

    fn id(&self) -> &str {
        &self.descriptor().id
    }

    fn config_schema(&self) -> ConfigSchema {
        self.descriptor().config_schema.clone()
    }

    /// Validate a raw payload. Defaults to checking it against the declared schema.
    fn validate_config(&self, raw: &Value) -> ConfigValidation {
        self.descriptor().config_schema.validate(raw)
    }

    fn auth_requirement(&self) -> Option<AuthRequirement> {
        self.descriptor().auth.clone()
    }

    async fn health_check(&self) -> HealthReport {
        HealthReport::healthy("ok")
    }

    fn retention_policy(&self) -> RetentionPolicy {
        self.descriptor().retention
    }
}
