// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-plugin cron timers.
//!
//! Each scheduled plugin owns one task that sleeps until the next occurrence
//! of its expression and then spawns the fetch, so a slow fetch never delays
//! the timer. Overlapping fires are coalesced by the runtime's in-flight
//! guard.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use croner::Cron;
use herald_config::PluginSettings;
use herald_config::validation::parse_schedule;
use herald_core::HeraldError;
use herald_plugin::ReloadAction;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::trigger::FetchTrigger;

struct Job {
    schedule: String,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Job {
    fn cancel(self) {
        self.cancel.cancel();
        // The task exits at its next select; aborting also covers a task that
        // has not been polled yet.
        self.handle.abort();
    }
}

/// Cron scheduler with a live job table keyed by plugin id.
pub struct Scheduler {
    trigger: Arc<dyn FetchTrigger>,
    jobs: Mutex<HashMap<String, Job>>,
}

impl Scheduler {
    pub fn new(trigger: Arc<dyn FetchTrigger>) -> Self {
        Self {
            trigger,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<String, Job>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install a timer for every enabled plugin that is loaded.
    ///
    /// Returns the number of timers installed. Orphaned settings and invalid
    /// expressions are warned about and skipped.
    pub fn start(&self, plugins: &BTreeMap<String, PluginSettings>) -> usize {
        let mut installed = 0;
        for (plugin_id, settings) in plugins.iter().filter(|(_, s)| s.enabled) {
            if !self.trigger.is_loaded(plugin_id) {
                warn!(plugin_id = %plugin_id, "enabled plugin is not loaded; not scheduling");
                continue;
            }
            if self.reschedule_plugin(plugin_id, &settings.schedule).is_ok() {
                installed += 1;
            }
        }
        info!(scheduled = installed, "scheduler started");
        installed
    }

    /// Cancel every timer. In-flight fetches are not waited for.
    pub fn stop(&self) {
        let jobs: Vec<Job> = self.jobs().drain().map(|(_, job)| job).collect();
        let count = jobs.len();
        for job in jobs {
            job.cancel();
        }
        info!(cancelled = count, "scheduler stopped");
    }

    /// Install or replace the timer of one plugin.
    ///
    /// The expression is validated first; on error the existing timer, if
    /// any, stays in place.
    pub fn reschedule_plugin(&self, plugin_id: &str, schedule: &str) -> Result<(), HeraldError> {
        let cron = match parse_schedule(schedule) {
            Ok(cron) => cron,
            Err(e) => {
                warn!(plugin_id, schedule, error = %e, "invalid cron expression; keeping previous timer");
                return Err(HeraldError::Config(format!(
                    "plugins.{plugin_id}.schedule: invalid cron expression `{schedule}`: {e}"
                )));
            }
        };
        if !self.trigger.is_loaded(plugin_id) {
            warn!(plugin_id, "plugin is not loaded; not scheduling");
            return Err(HeraldError::PluginNotFound {
                plugin_id: plugin_id.to_string(),
            });
        }

        let schedule = schedule.trim().to_string();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_timer(
            plugin_id.to_string(),
            cron,
            self.trigger.clone(),
            cancel.clone(),
        ));

        let previous = self.jobs().insert(
            plugin_id.to_string(),
            Job {
                schedule: schedule.clone(),
                cancel,
                handle,
            },
        );
        match previous {
            Some(old) => {
                info!(plugin_id, from = %old.schedule, to = %schedule, "plugin rescheduled");
                old.cancel();
            }
            None => info!(plugin_id, schedule = %schedule, "plugin scheduled"),
        }
        Ok(())
    }

    /// Remove a plugin's timer. Returns false if none was installed.
    pub fn unschedule_plugin(&self, plugin_id: &str) -> bool {
        let removed = self.jobs().remove(plugin_id);
        match removed {
            Some(job) => {
                job.cancel();
                info!(plugin_id, "plugin unscheduled");
                true
            }
            None => false,
        }
    }

    /// Apply the timer actions of a reload plan; lifecycle actions are ignored.
    pub fn apply_plan(&self, plan: &[ReloadAction]) {
        for action in plan {
            match action {
                ReloadAction::Schedule {
                    plugin_id,
                    schedule,
                }
                | ReloadAction::Reschedule {
                    plugin_id,
                    schedule,
                } => {
                    // Failures are logged and leave the old timer running.
                    let _ = self.reschedule_plugin(plugin_id, schedule);
                }
                ReloadAction::Unschedule { plugin_id } => {
                    self.unschedule_plugin(plugin_id);
                }
                _ => {}
            }
        }
    }

    pub fn scheduled_count(&self) -> usize {
        self.jobs().len()
    }

    /// Ids with a timer, sorted.
    pub fn scheduled_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.jobs().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// The expression a plugin is currently scheduled with.
    pub fn schedule_of(&self, plugin_id: &str) -> Option<String> {
        self.jobs().get(plugin_id).map(|job| job.schedule.clone())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for (_, job) in self.jobs().drain() {
            job.cancel();
        }
    }
}

/// Time until `next`, zero if it is already due.
fn until(next: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

async fn run_timer(
    plugin_id: String,
    cron: Cron,
    trigger: Arc<dyn FetchTrigger>,
    cancel: CancellationToken,
) {
    // Occurrences are searched strictly after the last fire, so waking a
    // little early can never fire the same slot twice.
    let mut last_fire = Utc::now();
    loop {
        let now = Utc::now();
        let from = now.max(last_fire);
        let next = match cron.find_next_occurrence(&from, false) {
            Ok(next) => next,
            Err(e) => {
                warn!(plugin_id = %plugin_id, error = %e, "no next occurrence; timer stopped");
                return;
            }
        };
        debug!(plugin_id = %plugin_id, next = %next, "timer armed");

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(plugin_id = %plugin_id, "timer cancelled");
                return;
            }
            _ = tokio::time::sleep(until(next, now)) => {}
        }
        last_fire = next;

        let trigger = trigger.clone();
        let id = plugin_id.clone();
        tokio::spawn(async move { fire(trigger.as_ref(), &id).await });
    }
}

async fn fire(trigger: &dyn FetchTrigger, plugin_id: &str) {
    match trigger.trigger(plugin_id).await {
        Ok(report) => debug!(plugin_id, inserted = report.inserted, "scheduled fetch finished"),
        Err(e) if e.is_coalesced() => {
            info!(plugin_id, "scheduled fetch skipped; previous fetch still running");
        }
        Err(e) => warn!(plugin_id, error = %e, "scheduled fetch failed"),
    }
}
