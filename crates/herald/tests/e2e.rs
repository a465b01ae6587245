// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests of the service lifecycle.
//!
//! Each test runs a real service (HTTP listener on an ephemeral port, config
//! watcher, scheduler) over a temp directory with scripted plugins.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use herald::markers::Markers;
use herald::{ServiceController, StopOutcome};
use herald_config::ConfigManager;
use herald_core::{HeadlineDraft, HeraldError, RetentionPolicy, ServiceState};
use herald_plugin::{PluginOrigin, PluginRegistry};
use herald_storage::HeadlineFilter;
use herald_storage::queries::headlines;
use herald_test_utils::MockPlugin;
use serde_json::json;
use serial_test::serial;

fn document(data_dir: &Path, alpha_enabled: bool) -> String {
    format!(
        r#"
[service]
host = "127.0.0.1"
port = 0
data_dir = "{data_dir}"
shutdown_timeout_secs = 2

[vault]
use_keyring = false

[watcher]
debounce_ms = 100

[preferences]
theme = "dark"

[plugins.alpha]
enabled = {alpha_enabled}
schedule = "*/5 * * * *"
"#,
        data_dir = data_dir.display()
    )
}

struct Fixture {
    _dir: tempfile::TempDir,
    config_path: PathBuf,
    data_dir: PathBuf,
    alpha: Arc<MockPlugin>,
    controller: ServiceController,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    let config_path = dir.path().join("herald.toml");
    std::fs::write(&config_path, document(&data_dir, true)).unwrap();

    let alpha = Arc::new(
        MockPlugin::new("alpha").with_retention(RetentionPolicy::Count { max_items: 3 }),
    );
    let mut registry = PluginRegistry::new();
    registry
        .register(alpha.clone(), PluginOrigin::Builtin)
        .unwrap();

    let manager = Arc::new(ConfigManager::open(&config_path).unwrap());
    let controller = ServiceController::new(manager).with_registry(registry);
    Fixture {
        _dir: dir,
        config_path,
        data_dir,
        alpha,
        controller,
    }
}

/// Poll `condition` every 50ms for up to five seconds.
async fn eventually(mut condition: impl AsyncFnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn start_serves_http_and_writes_markers() {
    let fx = fixture();
    fx.controller.start().await.unwrap();

    let markers = Markers::new(&fx.data_dir);
    assert_eq!(markers.read_pid(), Some(std::process::id()));
    assert!(markers.status_path().exists());

    let status = fx.controller.status().await;
    assert_eq!(status.state, ServiceState::Running);
    assert!(status.running);
    assert_eq!(status.plugins.loaded, 1);
    assert_eq!(status.plugins.initialized, 1);
    assert_eq!(status.plugins.scheduled, 1);

    let port = status.port.unwrap();
    let body: serde_json::Value = reqwest::get(format!("http://127.0.0.1:{port}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");

    let remote: serde_json::Value = reqwest::get(format!("http://127.0.0.1:{port}/api/status"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(remote["state"], "running");
    assert_eq!(remote["pid"], std::process::id());

    assert_eq!(fx.controller.stop().await.unwrap(), StopOutcome::Stopped);
    assert!(!markers.exists());
    assert_eq!(fx.controller.state(), ServiceState::Stopped);
    assert_eq!(fx.alpha.shutdown_calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn second_start_fails_and_stop_is_idempotent() {
    let fx = fixture();
    fx.controller.start().await.unwrap();

    let err = fx.controller.start().await.unwrap_err();
    assert!(matches!(err, HeraldError::Lifecycle(_)));
    assert!(err.to_string().contains("already running"));

    assert_eq!(fx.controller.stop().await.unwrap(), StopOutcome::Stopped);
    assert_eq!(fx.controller.stop().await.unwrap(), StopOutcome::NotRunning);
    assert!(!fx.controller.status().await.running);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn stale_markers_do_not_block_start() {
    let fx = fixture();
    let markers = Markers::new(&fx.data_dir);
    std::fs::create_dir_all(&fx.data_dir).unwrap();
    // No process has pid 0; the marker is stale.
    std::fs::write(markers.pid_path(), "0").unwrap();

    fx.controller.start().await.unwrap();
    assert_eq!(markers.read_pid(), Some(std::process::id()));
    fx.controller.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn count_retention_keeps_most_recent_across_fetches() {
    let fx = fixture();
    fx.controller.start().await.unwrap();
    let runtime = fx.controller.runtime().await.unwrap();

    let base = Utc.with_ymd_and_hms(2026, 10, 1, 8, 0, 0).unwrap();
    for batch in 0..3 {
        let drafts = (0..2)
            .map(|j| {
                let n = batch * 2 + j;
                HeadlineDraft::new(format!("h{n}"))
                    .with_guid(format!("g{n}"))
                    .with_published_at(base + chrono::Duration::minutes(n))
            })
            .collect();
        fx.alpha.push_batch(drafts);
        runtime.fetch_one("alpha").await.unwrap();
    }

    let stored = headlines::list_headlines(runtime.database(), &HeadlineFilter::default())
        .await
        .unwrap();
    let titles: Vec<&str> = stored.iter().map(|h| h.title.as_str()).collect();
    assert_eq!(titles, vec!["h5", "h4", "h3"]);

    fx.controller.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn disabling_in_file_removes_timer_without_restart() {
    let fx = fixture();
    fx.controller.start().await.unwrap();
    let scheduler = fx.controller.scheduler().await.unwrap();
    let runtime = fx.controller.runtime().await.unwrap();
    assert_eq!(scheduler.scheduled_ids(), vec!["alpha".to_string()]);

    std::fs::write(&fx.config_path, document(&fx.data_dir, false)).unwrap();

    assert!(
        eventually(async || scheduler.scheduled_count() == 0).await,
        "timer was not removed"
    );
    assert!(eventually(async || !runtime.is_initialized("alpha")).await);
    assert!(!fx.controller.manager().current().plugins["alpha"].enabled);

    fx.controller.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn invalid_file_keeps_schedule_and_preferences() {
    let fx = fixture();
    fx.controller.start().await.unwrap();
    let scheduler = fx.controller.scheduler().await.unwrap();

    let broken = document(&fx.data_dir, true).replace("*/5 * * * *", "every five minutes");
    std::fs::write(&fx.config_path, broken).unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(scheduler.schedule_of("alpha").as_deref(), Some("*/5 * * * *"));
    let current = fx.controller.manager().current();
    assert_eq!(current.preferences.get("theme"), Some(&json!("dark")));
    assert_eq!(current.plugins["alpha"].schedule, "*/5 * * * *");

    // A later valid edit is still picked up.
    let changed = document(&fx.data_dir, true).replace("*/5 * * * *", "0 * * * *");
    std::fs::write(&fx.config_path, changed).unwrap();
    assert!(
        eventually(async || scheduler.schedule_of("alpha").as_deref() == Some("0 * * * *")).await
    );

    fx.controller.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn setter_changes_apply_to_running_service() {
    let fx = fixture();
    fx.controller.start().await.unwrap();
    let scheduler = fx.controller.scheduler().await.unwrap();

    fx.controller
        .manager()
        .set_plugin_schedule("alpha", "15 * * * *")
        .unwrap();
    assert!(
        eventually(async || scheduler.schedule_of("alpha").as_deref() == Some("15 * * * *")).await
    );

    let persisted = std::fs::read_to_string(&fx.config_path).unwrap();
    assert!(persisted.contains("15 * * * *"));

    fx.controller.stop().await.unwrap();
}
