// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fetch pipeline, lifecycle, and hot-reload behavior of the plugin runtime.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use herald_config::{HeraldConfig, PluginSettings};
use herald_core::{AuthType, Credential, CredentialSecret, HeadlineDraft, HeraldError, RetentionPolicy};
use herald_plugin::{ReloadAction, plan_reload};
use herald_storage::HeadlineFilter;
use herald_storage::queries::{headlines, plugin_state};
use herald_test_utils::{MockPlugin, TestHarness};
use serde_json::json;

const EVERY_5: &str = "*/5 * * * *";

fn batch(prefix: &str, start_hour: i64, n: i64) -> Vec<HeadlineDraft> {
    let base = Utc::now() - ChronoDuration::days(1);
    (0..n)
        .map(|i| {
            HeadlineDraft::new(format!("{prefix} {i}"))
                .with_guid(format!("{prefix}-{i}"))
                .with_published_at(base + ChronoDuration::hours(start_hour + i))
        })
        .collect()
}

async fn titles(harness: &TestHarness, plugin_id: &str) -> Vec<String> {
    let filter = HeadlineFilter {
        plugin_id: Some(plugin_id.to_string()),
        ..HeadlineFilter::default()
    };
    headlines::list_headlines(&harness.db, &filter)
        .await
        .unwrap()
        .into_iter()
        .map(|h| h.title)
        .collect()
}

#[tokio::test]
async fn count_retention_keeps_most_recent() {
    let plugin = Arc::new(MockPlugin::new("news").with_retention(RetentionPolicy::Count { max_items: 3 }));
    plugin.push_batch(batch("a", 0, 2));
    plugin.push_batch(batch("b", 2, 2));
    plugin.push_batch(batch("c", 4, 2));
    let harness = TestHarness::builder()
        .with_plugin(plugin.clone())
        .enable("news", EVERY_5, json!({}))
        .build()
        .await
        .unwrap();

    for _ in 0..3 {
        harness.runtime.fetch_one("news").await.unwrap();
    }

    assert_eq!(headlines::count_headlines(&harness.db, Some("news")).await.unwrap(), 3);
    assert_eq!(titles(&harness, "news").await, vec!["c 1", "c 0", "b 1"]);
    assert_eq!(plugin.fetch_calls(), 3);
}

#[tokio::test]
async fn duration_retention_drops_old_items() {
    let plugin = Arc::new(MockPlugin::new("news").with_retention(RetentionPolicy::Duration { hours: 24 }));
    let now = Utc::now();
    plugin.push_batch(vec![
        HeadlineDraft::new("fresh").with_guid("1").with_published_at(now - ChronoDuration::hours(1)),
        HeadlineDraft::new("stale").with_guid("2").with_published_at(now - ChronoDuration::hours(48)),
    ]);
    let harness = TestHarness::builder()
        .with_plugin(plugin)
        .enable("news", EVERY_5, json!({}))
        .build()
        .await
        .unwrap();

    let report = harness.runtime.fetch_one("news").await.unwrap();
    assert_eq!(report.inserted, 2);
    assert_eq!(report.removed, 1);
    assert_eq!(titles(&harness, "news").await, vec!["fresh"]);
}

#[tokio::test]
async fn unbounded_duration_retention_keeps_everything() {
    let plugin = Arc::new(MockPlugin::new("news").with_retention(RetentionPolicy::Duration { hours: u32::MAX }));
    plugin.push_batch(batch("a", 0, 2));
    let harness = TestHarness::builder()
        .with_plugin(plugin)
        .enable("news", EVERY_5, json!({}))
        .build()
        .await
        .unwrap();

    let runtime = harness.runtime.clone();
    let report = tokio::spawn(async move { runtime.fetch_one("news").await })
        .await
        .expect("fetch task must not panic")
        .unwrap();
    assert_eq!((report.inserted, report.removed), (2, 0));
    let state = plugin_state::get_run_state(&harness.db, "news").await.unwrap().unwrap();
    assert_eq!(state.run_count, 1);
}

#[tokio::test]
async fn refetching_the_same_items_is_idempotent() {
    let plugin = Arc::new(MockPlugin::new("news"));
    plugin.push_batch(batch("a", 0, 2));
    plugin.push_batch(batch("a", 0, 2));
    let harness = TestHarness::builder()
        .with_plugin(plugin)
        .enable("news", EVERY_5, json!({}))
        .build()
        .await
        .unwrap();

    let first = harness.runtime.fetch_one("news").await.unwrap();
    let second = harness.runtime.fetch_one("news").await.unwrap();
    assert_eq!((first.inserted, first.duplicates), (2, 0));
    assert_eq!((second.inserted, second.duplicates), (0, 2));
    assert_eq!(headlines::count_headlines(&harness.db, None).await.unwrap(), 2);
}

#[tokio::test]
async fn blank_titles_are_skipped() {
    let plugin = Arc::new(MockPlugin::new("news"));
    plugin.push_batch(vec![HeadlineDraft::new("kept"), HeadlineDraft::new("   ")]);
    let harness = TestHarness::builder()
        .with_plugin(plugin)
        .enable("news", EVERY_5, json!({}))
        .build()
        .await
        .unwrap();

    let report = harness.runtime.fetch_one("news").await.unwrap();
    assert_eq!((report.fetched, report.inserted, report.skipped), (2, 1, 1));
}

#[tokio::test]
async fn unknown_and_disabled_plugins_are_distinguished() {
    let mut config = HeraldConfig::default();
    let mut settings = PluginSettings::enabled(EVERY_5, json!({}));
    settings.enabled = false;
    config.plugins.insert("news".into(), settings);

    let plugin = Arc::new(MockPlugin::new("news"));
    plugin.push_batch(batch("a", 0, 2));
    let harness = TestHarness::builder()
        .with_plugin(plugin.clone())
        .with_config(config)
        .build()
        .await
        .unwrap();

    let missing = harness.runtime.fetch_one("ghost").await.unwrap_err();
    assert!(missing.is_not_found(), "{missing}");
    let disabled = harness.runtime.fetch_one("news").await.unwrap_err();
    assert!(disabled.is_not_enabled(), "{disabled}");

    assert_eq!(plugin.fetch_calls(), 0);
    assert_eq!(headlines::count_headlines(&harness.db, None).await.unwrap(), 0);
    assert!(plugin_state::get_run_state(&harness.db, "news").await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_triggers_are_coalesced() {
    let plugin = Arc::new(MockPlugin::new("slow").with_fetch_delay(Duration::from_millis(300)));
    plugin.push_batch(batch("s", 0, 1));
    let harness = TestHarness::builder()
        .with_plugin(plugin.clone())
        .enable("slow", EVERY_5, json!({}))
        .build()
        .await
        .unwrap();

    let runtime = harness.runtime.clone();
    let first = tokio::spawn(async move { runtime.fetch_one("slow").await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(harness.runtime.is_fetching("slow"));

    for _ in 0..2 {
        let err = harness.runtime.fetch_one("slow").await.unwrap_err();
        assert!(matches!(err, HeraldError::FetchInProgress { .. }), "{err}");
    }

    let report = first.await.unwrap().unwrap();
    assert_eq!(report.inserted, 1);
    assert_eq!(plugin.fetch_calls(), 1);
    assert!(harness.runtime.wait_idle(Duration::from_secs(1)).await);
}

#[tokio::test]
async fn failures_are_recorded_and_isolated() {
    let broken = Arc::new(MockPlugin::new("broken"));
    broken.push_error("upstream returned 500");
    let healthy = Arc::new(MockPlugin::new("healthy"));
    healthy.push_batch(batch("h", 0, 1));
    let harness = TestHarness::builder()
        .with_plugin(broken)
        .with_plugin(healthy)
        .enable("broken", EVERY_5, json!({}))
        .enable("healthy", EVERY_5, json!({}))
        .build()
        .await
        .unwrap();

    let outcomes = harness.runtime.fetch_all().await;
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].plugin_id, "broken");
    assert!(outcomes[0].result.is_err());
    assert!(outcomes[1].result.is_ok());

    let state = plugin_state::get_run_state(&harness.db, "broken").await.unwrap().unwrap();
    assert_eq!(state.last_error.as_deref(), Some("upstream returned 500"));
    assert_eq!(state.error_count, 1);
    let state = plugin_state::get_run_state(&harness.db, "healthy").await.unwrap().unwrap();
    assert!(state.last_error.is_none());
    assert!(state.last_success_at.is_some());
}

#[tokio::test]
async fn initialization_failures_are_recorded() {
    let failing = Arc::new(MockPlugin::new("failing"));
    failing.set_fail_initialize(true);
    let strict = Arc::new(MockPlugin::new("strict").with_required_key("url"));
    let harness = TestHarness::builder()
        .with_plugin(failing.clone())
        .with_plugin(strict.clone())
        .enable("failing", EVERY_5, json!({}))
        .enable("strict", EVERY_5, json!({}))
        .build()
        .await
        .unwrap();

    assert!(!harness.runtime.is_initialized("failing"));
    assert!(!harness.runtime.is_initialized("strict"));
    assert_eq!(strict.init_calls(), 0);

    let state = plugin_state::get_run_state(&harness.db, "strict").await.unwrap().unwrap();
    assert!(state.last_error.unwrap().contains("invalid configuration"));

    let err = harness.runtime.fetch_one("failing").await.unwrap_err();
    assert!(err.to_string().contains("not initialized"), "{err}");
    assert_eq!(failing.fetch_calls(), 0);
}

#[tokio::test]
async fn credentials_are_resolved_from_the_vault() {
    let plugin = Arc::new(MockPlugin::new("secure").with_auth(AuthType::ApiKey));
    let harness = TestHarness::builder()
        .with_plugin(plugin.clone())
        .enable("secure", EVERY_5, json!({}))
        .build()
        .await
        .unwrap();

    let err = harness.runtime.fetch_one("secure").await.unwrap_err();
    assert!(err.to_string().contains("no apikey credential"), "{err}");
    assert_eq!(plugin.fetch_calls(), 0);

    harness
        .vault
        .store(&Credential::new(
            "secure",
            CredentialSecret::ApiKey {
                key: "k-123".into(),
            },
        ))
        .await
        .unwrap();
    harness.runtime.fetch_one("secure").await.unwrap();

    let ctx = plugin.last_context().unwrap();
    assert_eq!(ctx.credential.unwrap().auth_type(), AuthType::ApiKey);
}

#[tokio::test]
async fn last_run_time_is_passed_to_the_next_fetch() {
    let plugin = Arc::new(MockPlugin::new("news"));
    let harness = TestHarness::builder()
        .with_plugin(plugin.clone())
        .enable("news", EVERY_5, json!({}))
        .build()
        .await
        .unwrap();

    harness.runtime.fetch_one("news").await.unwrap();
    assert!(plugin.last_context().unwrap().last_run_at.is_none());
    let second = harness.runtime.fetch_one("news").await.unwrap();
    assert!(plugin.last_context().unwrap().last_run_at.is_some());
    assert!(second.finished_at >= second.started_at);
}

#[tokio::test]
async fn reload_reinitializes_and_shuts_down() {
    let alpha = Arc::new(MockPlugin::new("alpha"));
    let beta = Arc::new(MockPlugin::new("beta"));
    let harness = TestHarness::builder()
        .with_plugin(alpha.clone())
        .with_plugin(beta.clone())
        .enable("alpha", EVERY_5, json!({"v": 1}))
        .enable("beta", EVERY_5, json!({}))
        .build()
        .await
        .unwrap();
    let previous = harness.runtime.config();

    let mut next = (*previous).clone();
    next.plugins.get_mut("alpha").unwrap().config = json!({"v": 2});
    next.plugins.get_mut("beta").unwrap().enabled = false;
    let plan = plan_reload(&previous.plugins, &next.plugins, |id| harness.runtime.is_loaded(id));
    assert!(plan.contains(&ReloadAction::Reinitialize {
        plugin_id: "alpha".into()
    }));

    let report = harness.runtime.apply_reload(Arc::new(next), &plan).await;
    assert!(report.failed.is_empty());

    assert_eq!(alpha.init_calls(), 2);
    assert_eq!(alpha.shutdown_calls(), 1);
    assert_eq!(alpha.last_config(), Some(json!({"v": 2})));
    assert!(!harness.runtime.is_initialized("beta"));
    assert_eq!(beta.shutdown_calls(), 1);
    assert!(harness.runtime.fetch_one("beta").await.unwrap_err().is_not_enabled());
}

#[tokio::test]
async fn fetch_uses_the_config_the_plugin_was_initialized_with() {
    let plugin = Arc::new(MockPlugin::new("news"));
    let harness = TestHarness::builder()
        .with_plugin(plugin.clone())
        .enable("news", EVERY_5, json!({"v": 1}))
        .build()
        .await
        .unwrap();

    let mut next = (*harness.runtime.config()).clone();
    next.plugins.get_mut("news").unwrap().config = json!({"v": 2});
    harness.runtime.set_config(Arc::new(next));

    harness.runtime.fetch_one("news").await.unwrap();
    assert_eq!(plugin.last_context().unwrap().config, json!({"v": 1}));

    harness.runtime.reload_plugin("news").await.unwrap();
    harness.runtime.fetch_one("news").await.unwrap();
    assert_eq!(plugin.last_context().unwrap().config, json!({"v": 2}));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reload_of_an_idle_plugin_does_not_wait_for_a_busy_one() {
    let slow = Arc::new(MockPlugin::new("slow").with_fetch_delay(Duration::from_secs(2)));
    let quick = Arc::new(MockPlugin::new("quick"));
    let harness = TestHarness::builder()
        .with_plugin(slow.clone())
        .with_plugin(quick.clone())
        .enable("slow", EVERY_5, json!({"v": 1}))
        .enable("quick", EVERY_5, json!({"v": 1}))
        .build()
        .await
        .unwrap();

    let runtime = harness.runtime.clone();
    let fetch = tokio::spawn(async move { runtime.fetch_one("slow").await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let previous = harness.runtime.config();
    let mut next = (*previous).clone();
    next.plugins.get_mut("slow").unwrap().config = json!({"v": 2});
    next.plugins.get_mut("quick").unwrap().config = json!({"v": 2});
    let plan = plan_reload(&previous.plugins, &next.plugins, |id| harness.runtime.is_loaded(id));
    let runtime = harness.runtime.clone();
    let reload = tokio::spawn(async move { runtime.apply_reload(Arc::new(next), &plan).await });

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(quick.last_config(), Some(json!({"v": 2})));
    assert_eq!(slow.last_config(), Some(json!({"v": 1})));
    assert!(!reload.is_finished());

    fetch.await.unwrap().unwrap();
    let report = reload.await.unwrap();
    assert_eq!(report.applied.len(), 2);
    assert_eq!(slow.last_config(), Some(json!({"v": 2})));
}

#[tokio::test]
async fn reload_plugin_and_summaries() {
    let plugin = Arc::new(MockPlugin::new("news").with_retention(RetentionPolicy::Count { max_items: 10 }));
    plugin.push_batch(batch("a", 0, 1));
    let harness = TestHarness::builder()
        .with_plugin(plugin.clone())
        .enable("news", EVERY_5, json!({}))
        .build()
        .await
        .unwrap();

    harness.runtime.reload_plugin("news").await.unwrap();
    assert_eq!(plugin.init_calls(), 2);
    assert!(harness.runtime.reload_plugin("ghost").await.unwrap_err().is_not_found());

    harness.runtime.fetch_one("news").await.unwrap();
    let summaries = harness.runtime.summaries().await.unwrap();
    assert_eq!(summaries.len(), 1);
    let news = &summaries[0];
    assert!(news.enabled && news.initialized && !news.fetching);
    assert_eq!(news.origin, "builtin");
    assert_eq!(news.schedule.as_deref(), Some(EVERY_5));
    assert_eq!(news.retention, RetentionPolicy::Count { max_items: 10 });
    assert_eq!(news.run_count, 1);

    let counts = harness.runtime.counts(1);
    assert_eq!((counts.loaded, counts.enabled, counts.initialized, counts.scheduled), (1, 1, 1, 1));
}
