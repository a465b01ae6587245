// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Diffing of plugin settings into hot-reload actions.

use std::collections::{BTreeMap, BTreeSet};

use herald_config::PluginSettings;
use serde::Serialize;

/// One step of applying a configuration change.
///
/// Lifecycle actions are applied by the runtime, timer actions by the
/// scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReloadAction {
    Initialize { plugin_id: String },
    Reinitialize { plugin_id: String },
    Shutdown { plugin_id: String },
    Schedule { plugin_id: String, schedule: String },
    Reschedule { plugin_id: String, schedule: String },
    Unschedule { plugin_id: String },
}

impl ReloadAction {
    pub fn plugin_id(&self) -> &str {
        match self {
            ReloadAction::Initialize { plugin_id }
            | ReloadAction::Reinitialize { plugin_id }
            | ReloadAction::Shutdown { plugin_id }
            | ReloadAction::Schedule { plugin_id, .. }
            | ReloadAction::Reschedule { plugin_id, .. }
            | ReloadAction::Unschedule { plugin_id } => plugin_id,
        }
    }

    /// True for actions the scheduler applies.
    pub fn is_timer_action(&self) -> bool {
        matches!(
            self,
            ReloadAction::Schedule { .. }
                | ReloadAction::Reschedule { .. }
                | ReloadAction::Unschedule { .. }
        )
    }
}

/// Compute the actions that move the system from `previous` to `current`.
///
/// Only plugins for which `is_loaded` holds are considered; settings for
/// unknown plugins produce no actions. Importance overrides need no action
/// because fetches read them from the current snapshot.
pub fn plan_reload(
    previous: &BTreeMap<String, PluginSettings>,
    current: &BTreeMap<String, PluginSettings>,
    is_loaded: impl Fn(&str) -> bool,
) -> Vec<ReloadAction> {
    let ids: BTreeSet<&String> = previous.keys().chain(current.keys()).collect();
    let mut actions = Vec::new();

    for id in ids {
        if !is_loaded(id) {
            continue;
        }
        let before = previous.get(id).filter(|s| s.enabled);
        let after = current.get(id).filter(|s| s.enabled);
        let plugin_id = id.clone();

        match (before, after) {
            (None, Some(after)) => {
                actions.push(ReloadAction::Initialize {
                    plugin_id: plugin_id.clone(),
                });
                actions.push(ReloadAction::Schedule {
                    plugin_id,
                    schedule: after.schedule.clone(),
                });
            }
            (Some(_), None) => {
                actions.push(ReloadAction::Unschedule {
                    plugin_id: plugin_id.clone(),
                });
                actions.push(ReloadAction::Shutdown { plugin_id });
            }
            (Some(before), Some(after)) => {
                if before.config != after.config {
                    actions.push(ReloadAction::Reinitialize {
                        plugin_id: plugin_id.clone(),
                    });
                }
                if before.schedule.trim() != after.schedule.trim() {
                    actions.push(ReloadAction::Reschedule {
                        plugin_id,
                        schedule: after.schedule.clone(),
                    });
                }
            }
            (None, None) => {}
        }
    }
    actions
}
