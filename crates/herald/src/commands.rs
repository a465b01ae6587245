// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot CLI commands: `status`, `stop`, `fetch`, and `plugins`.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use herald_config::HeraldConfig;
use herald_core::{HeraldError, ServiceStatus};
use herald_plugin::{FetchReport, PluginSummary};

use crate::compose::{default_registry, open_components};
use crate::markers::Markers;
use crate::service::{StopOutcome, stop_external};

/// Format seconds into a human-readable duration string.
pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

fn use_color(plain: bool) -> bool {
    !plain && std::io::stdout().is_terminal()
}

fn print_json<T: serde::Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    );
}

/// Ask a running service for its live status.
async fn query_live_status(host: &str, port: u16) -> Option<ServiceStatus> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .ok()?;
    let response = client
        .get(format!("http://{host}:{port}/api/status"))
        .send()
        .await
        .ok()?;
    if !response.status().is_success() {
        return None;
    }
    response.json().await.ok()
}

/// Status of the service recorded under `config.service.data_dir`.
///
/// Marker-derived, refreshed from `/api/status` when the service answers.
pub async fn resolve_status(config: &HeraldConfig) -> ServiceStatus {
    let status = Markers::new(&config.service.data_dir).external_status();
    if !status.running {
        return status;
    }
    let (Some(host), Some(port)) = (status.host.as_deref(), status.port) else {
        return status;
    };
    query_live_status(host, port).await.unwrap_or(status)
}

/// Run the `herald status` command.
pub async fn run_status(config: &HeraldConfig, json: bool, plain: bool) -> Result<(), HeraldError> {
    let status = resolve_status(config).await;
    if json {
        print_json(&status);
        return Ok(());
    }

    let color = use_color(plain);
    println!();
    println!("  herald status");
    println!("  {}", "-".repeat(35));
    if status.running {
        let uptime = format_uptime(status.uptime_secs.unwrap_or(0));
        if color {
            use colored::Colorize;
            println!(
                "    State:    {} {} (uptime: {uptime})",
                "✓".green(),
                status.state.to_string().green()
            );
        } else {
            println!("    State:    [OK] {} (uptime: {uptime})", status.state);
        }
        if let Some(pid) = status.pid {
            println!("    PID:      {pid}");
        }
        if let (Some(host), Some(port)) = (&status.host, status.port) {
            println!("    Endpoint: http://{host}:{port}/");
        }
        let p = status.plugins;
        println!(
            "    Plugins:  {} loaded, {} enabled, {} initialized, {} scheduled",
            p.loaded, p.enabled, p.initialized, p.scheduled
        );
    } else {
        if color {
            use colored::Colorize;
            println!("    State:    {} {}", "✗".red(), "not running".red());
        } else {
            println!("    State:    [FAIL] not running");
        }
        println!();
        println!("  Start with: herald start");
    }
    println!();
    Ok(())
}

/// Run the `herald stop` command against the service in another process.
pub async fn run_stop(config: &HeraldConfig) -> Result<(), HeraldError> {
    let markers = Markers::new(&config.service.data_dir);
    let wait = Duration::from_secs(config.service.shutdown_timeout_secs);
    match stop_external(&markers, wait).await? {
        StopOutcome::NotRunning => println!("herald is not running"),
        StopOutcome::Signalled { pid, forced: false } => println!("herald (pid {pid}) stopped"),
        StopOutcome::Signalled { pid, forced: true } => {
            println!("herald (pid {pid}) killed after {}s", wait.as_secs())
        }
        StopOutcome::Stopped => println!("herald stopped"),
    }
    Ok(())
}

fn describe_report(report: &FetchReport) -> String {
    format!(
        "{}: fetched {}, new {}, duplicates {}, skipped {}, pruned {} ({} ms)",
        report.plugin_id,
        report.fetched,
        report.inserted,
        report.duplicates,
        report.skipped,
        report.removed,
        (report.finished_at - report.started_at).num_milliseconds()
    )
}

/// Run the `herald fetch` command: one fetch for `plugin`, or every enabled plugin.
pub async fn run_fetch(config: Arc<HeraldConfig>, plugin: Option<&str>) -> Result<(), HeraldError> {
    let registry = Arc::new(default_registry(&config)?);
    let components = open_components(config, registry).await?;
    let runtime = components.runtime;
    runtime.initialize_all().await;

    let outcomes = match plugin {
        Some(id) => vec![(id.to_string(), runtime.fetch_one(id).await)],
        None => runtime
            .fetch_all()
            .await
            .into_iter()
            .map(|o| (o.plugin_id, o.result))
            .collect(),
    };

    let mut failed = 0usize;
    for (plugin_id, result) in &outcomes {
        match result {
            Ok(report) => println!("  ok    {}", describe_report(report)),
            Err(e) => {
                failed += 1;
                println!("  FAIL  {plugin_id}: {e}");
            }
        }
    }
    if outcomes.is_empty() {
        println!("no enabled plugins");
    }

    runtime.shutdown_all().await;
    components.db.close().await?;

    match (plugin, failed) {
        (_, 0) => Ok(()),
        (Some(_), _) => match outcomes.into_iter().next() {
            Some((_, Err(e))) => Err(e),
            _ => Ok(()),
        },
        (None, n) => Err(HeraldError::Internal(format!(
            "{n} of {} plugins failed",
            outcomes.len()
        ))),
    }
}

fn format_time(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn print_plugins(plugins: &[PluginSummary]) {
    if plugins.is_empty() {
        println!("no plugins loaded");
        return;
    }
    println!(
        "{:<16} {:<9} {:<8} {:<16} {:<20} {:>5}  LAST ERROR",
        "ID", "VERSION", "ENABLED", "SCHEDULE", "LAST SUCCESS", "RUNS"
    );
    for p in plugins {
        println!(
            "{:<16} {:<9} {:<8} {:<16} {:<20} {:>5}  {}",
            p.id,
            p.version,
            if p.enabled { "yes" } else { "no" },
            p.schedule.as_deref().unwrap_or("-"),
            format_time(p.last_success_at),
            p.run_count,
            p.last_error.as_deref().unwrap_or("-"),
        );
    }
}

/// Run the `herald plugins` command.
pub async fn run_plugins(config: Arc<HeraldConfig>, json: bool) -> Result<(), HeraldError> {
    let registry = Arc::new(default_registry(&config)?);
    let components = open_components(config, registry).await?;
    let plugins = components.runtime.summaries().await?;
    if json {
        print_json(&plugins);
    } else {
        print_plugins(&plugins);
    }
    components.db.close().await
}
