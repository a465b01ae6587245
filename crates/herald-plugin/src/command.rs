// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! External command plugins declared by `plugin.toml` manifests.
//!
//! Protocol: the command receives one JSON object on stdin
//! (`{plugin_id, config, credential, last_run_at}`) and must print a JSON
//! array of headline drafts on stdout, then exit 0.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use herald_core::{FetchContext, HeadlineDraft, HealthReport, HeraldError, PluginDescriptor, SourcePlugin};
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::manifest::{DiscoveredManifest, PluginManifest};

/// Cap on stderr echoed into error messages.
const STDERR_EXCERPT: usize = 512;

pub struct CommandPlugin {
    descriptor: PluginDescriptor,
    program: String,
    args: Vec<String>,
    working_dir: PathBuf,
    timeout: Duration,
    config: ArcSwapOption<Value>,
}

impl CommandPlugin {
    pub fn new(manifest: &PluginManifest, working_dir: impl Into<PathBuf>) -> Self {
        let mut command = manifest.command.iter().cloned();
        Self {
            descriptor: manifest.descriptor(),
            program: command.next().unwrap_or_default(),
            args: command.collect(),
            working_dir: working_dir.into(),
            timeout: Duration::from_secs(manifest.timeout_secs),
            config: ArcSwapOption::empty(),
        }
    }

    pub fn from_discovered(found: &DiscoveredManifest) -> Self {
        Self::new(&found.manifest, &found.dir)
    }

    async fn run(&self, input: Vec<u8>) -> Result<Vec<u8>, String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("failed to spawn `{}`: {e}", self.program))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A command that exits without reading stdin closes the pipe; its
            // exit status is what matters.
            if let Err(e) = stdin.write_all(&input).await {
                debug!(program = %self.program, error = %e, "command closed stdin early");
            }
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| format!("command timed out after {}s", self.timeout.as_secs()))?
            .map_err(|e| format!("failed to wait for command: {e}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let excerpt: String = stderr.trim().chars().take(STDERR_EXCERPT).collect();
            return Err(format!("command exited with {}: {excerpt}", output.status));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl SourcePlugin for CommandPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    async fn initialize(&self, config: &Value) -> Result<(), HeraldError> {
        self.config.store(Some(Arc::new(config.clone())));
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), HeraldError> {
        self.config.store(None);
        Ok(())
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<Vec<HeadlineDraft>, HeraldError> {
        let config = self
            .config
            .load_full()
            .ok_or_else(|| HeraldError::execution(&ctx.plugin_id, "plugin is not initialized"))?;
        let input = serde_json::to_vec(&json!({
            "plugin_id": ctx.plugin_id,
            "config": config.as_ref(),
            "credential": ctx.credential,
            "last_run_at": ctx.last_run_at,
        }))
        .map_err(|e| HeraldError::execution(&ctx.plugin_id, e.to_string()))?;

        let stdout = self
            .run(input)
            .await
            .map_err(|e| HeraldError::execution(&ctx.plugin_id, e))?;
        serde_json::from_slice::<Vec<HeadlineDraft>>(&stdout).map_err(|e| {
            HeraldError::execution(&ctx.plugin_id, format!("command output is not a draft list: {e}"))
        })
    }

    async fn health_check(&self) -> HealthReport {
        if self.config.load().is_none() {
            HealthReport::unhealthy("not initialized")
        } else {
            HealthReport::healthy(format!("runs `{}`", self.program))
        }
    }
}
