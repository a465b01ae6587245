// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! What a timer fires.

use async_trait::async_trait;
use herald_core::HeraldError;
use herald_plugin::{FetchReport, PluginRuntime};

/// Target of scheduled fetches.
#[async_trait]
pub trait FetchTrigger: Send + Sync + 'static {
    /// Whether a plugin with this id is loaded.
    fn is_loaded(&self, plugin_id: &str) -> bool;

    async fn trigger(&self, plugin_id: &str) -> Result<FetchReport, HeraldError>;
}

#[async_trait]
impl FetchTrigger for PluginRuntime {
    fn is_loaded(&self, plugin_id: &str) -> bool {
        PluginRuntime::is_loaded(self, plugin_id)
    }

    async fn trigger(&self, plugin_id: &str) -> Result<FetchReport, HeraldError> {
        self.fetch_one(plugin_id).await
    }
}
