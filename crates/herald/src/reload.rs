// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Applies accepted configuration changes to the runtime and scheduler.

use std::sync::Arc;

use async_trait::async_trait;
use herald_config::{ConfigChangeHandler, HeraldConfig};
use herald_cron::Scheduler;
use herald_plugin::{PluginRuntime, ReloadAction, plan_reload};
use tracing::{info, warn};

pub struct ReloadCoordinator {
    runtime: Arc<PluginRuntime>,
    scheduler: Arc<Scheduler>,
}

impl ReloadCoordinator {
    pub fn new(runtime: Arc<PluginRuntime>, scheduler: Arc<Scheduler>) -> Self {
        Self { runtime, scheduler }
    }
}

#[async_trait]
impl ConfigChangeHandler for ReloadCoordinator {
    async fn on_config_change(&self, previous: Arc<HeraldConfig>, current: Arc<HeraldConfig>) {
        let plan = plan_reload(&previous.plugins, &current.plugins, |id| {
            self.runtime.is_loaded(id)
        });
        // Timers of disabled or rescheduled plugins change before any lifecycle
        // action waits on an in-flight fetch; new timers start after initialize.
        let (early, late): (Vec<ReloadAction>, Vec<ReloadAction>) =
            plan.iter().cloned().partition(|action| {
                matches!(
                    action,
                    ReloadAction::Unschedule { .. } | ReloadAction::Reschedule { .. }
                )
            });
        self.scheduler.apply_plan(&early);
        let report = self.runtime.apply_reload(current, &plan).await;
        self.scheduler.apply_plan(&late);

        for (plugin_id, error) in &report.failed {
            warn!(plugin_id = %plugin_id, error = %error, "plugin reload failed");
        }
        info!(
            actions = plan.len(),
            failed = report.failed.len(),
            scheduled = self.scheduler.scheduled_count(),
            "configuration change applied"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_config::PluginSettings;
    use herald_test_utils::{MockPlugin, TestHarness};
    use serde_json::json;

    fn config(alpha_enabled: bool, url: &str) -> HeraldConfig {
        let mut config = HeraldConfig::default();
        let mut alpha = PluginSettings::enabled("*/5 * * * *", json!({ "url": url }));
        alpha.enabled = alpha_enabled;
        config.plugins.insert("alpha".into(), alpha);
        config
    }

    #[tokio::test]
    async fn disable_reconfigure_and_enable() {
        let alpha = Arc::new(MockPlugin::new("alpha"));
        let initial = Arc::new(config(true, "a"));
        let harness = TestHarness::builder()
            .with_plugin(alpha.clone())
            .with_config(initial.as_ref().clone())
            .build()
            .await
            .unwrap();
        let scheduler = Arc::new(Scheduler::new(harness.runtime.clone()));
        scheduler.start(&initial.plugins);
        let coordinator = ReloadCoordinator::new(harness.runtime.clone(), scheduler.clone());

        let changed = Arc::new(config(true, "b"));
        coordinator
            .on_config_change(initial.clone(), changed.clone())
            .await;
        assert_eq!(alpha.init_calls(), 2);
        assert_eq!(alpha.last_config(), Some(json!({"url": "b"})));
        assert_eq!(scheduler.scheduled_count(), 1);

        let disabled = Arc::new(config(false, "b"));
        coordinator
            .on_config_change(changed.clone(), disabled.clone())
            .await;
        assert!(!harness.runtime.is_initialized("alpha"));
        assert_eq!(scheduler.scheduled_count(), 0);
        assert!(!harness.runtime.config().plugins["alpha"].enabled);

        coordinator.on_config_change(disabled, changed).await;
        assert!(harness.runtime.is_initialized("alpha"));
        assert_eq!(scheduler.schedule_of("alpha").as_deref(), Some("*/5 * * * *"));
        scheduler.stop();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn busy_plugin_loses_its_timer_without_blocking_others() {
        use std::time::{Duration, Instant};

        let alpha = Arc::new(MockPlugin::new("alpha").with_fetch_delay(Duration::from_secs(2)));
        let beta = Arc::new(MockPlugin::new("beta"));
        let mut initial = config(true, "a");
        initial.plugins.insert(
            "beta".into(),
            PluginSettings::enabled("*/10 * * * *", json!({ "url": "b1" })),
        );
        let initial = Arc::new(initial);
        let harness = TestHarness::builder()
            .with_plugin(alpha.clone())
            .with_plugin(beta.clone())
            .with_config(initial.as_ref().clone())
            .build()
            .await
            .unwrap();
        let scheduler = Arc::new(Scheduler::new(harness.runtime.clone()));
        scheduler.start(&initial.plugins);
        assert_eq!(scheduler.scheduled_count(), 2);

        let runtime = harness.runtime.clone();
        let fetch = tokio::spawn(async move { runtime.fetch_one("alpha").await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(harness.runtime.is_fetching("alpha"));

        let mut changed = initial.as_ref().clone();
        changed.plugins.get_mut("alpha").unwrap().enabled = false;
        changed.plugins.get_mut("beta").unwrap().config = json!({ "url": "b2" });
        let changed = Arc::new(changed);

        let coordinator = Arc::new(ReloadCoordinator::new(harness.runtime.clone(), scheduler.clone()));
        let started = Instant::now();
        let reload = {
            let coordinator = coordinator.clone();
            let (initial, changed) = (initial.clone(), changed.clone());
            tokio::spawn(async move { coordinator.on_config_change(initial, changed).await })
        };

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(scheduler.scheduled_ids(), vec!["beta".to_string()]);
        assert_eq!(beta.last_config(), Some(json!({ "url": "b2" })));
        assert!(!reload.is_finished(), "alpha's shutdown waits for its fetch");
        assert!(started.elapsed() < Duration::from_secs(1));

        fetch.await.unwrap().unwrap();
        reload.await.unwrap();
        assert!(!harness.runtime.is_initialized("alpha"));
        assert_eq!(alpha.shutdown_calls(), 1);
        scheduler.stop();
    }
}
