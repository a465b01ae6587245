// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types for storage entities.
//!
//! Headlines use the canonical [`herald_core::Headline`]; the rest are
//! storage-specific.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub use herald_core::Headline;

/// Filter for listing headlines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadlineFilter {
    pub plugin_id: Option<String>,
    /// Only headlines with importance at or above this score.
    pub min_importance: Option<f64>,
    pub include_archived: bool,
    pub limit: u32,
    pub offset: u32,
}

impl Default for HeadlineFilter {
    fn default() -> Self {
        Self {
            plugin_id: None,
            min_importance: None,
            include_archived: true,
            limit: 50,
            offset: 0,
        }
    }
}

/// Partial update of the three headline status flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagUpdate {
    pub read: Option<bool>,
    pub starred: Option<bool>,
    pub archived: Option<bool>,
}

/// Result of a batch insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertOutcome {
    pub inserted: usize,
    pub duplicates: usize,
}

/// Persisted run-state of a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginRunState {
    pub plugin_id: String,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub run_count: u64,
    pub error_count: u64,
}

/// Where a credential's secret payload lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    /// OS keyring; the row holds metadata only (plus an optional mirror).
    Keyring,
    /// The row itself holds the payload.
    Store,
}

/// A row of the `credentials` table.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialRow {
    pub plugin_id: String,
    pub auth_type: String,
    pub backend: CredentialBackend,
    /// Serialized secret. Present for store-backed rows and mirrored keyring rows.
    pub payload: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
