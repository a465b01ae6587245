// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Source plugins for the Herald feed curator.
//!
//! Holds the [`PluginRegistry`], the built-in RSS plugin, external command
//! plugins declared by `plugin.toml` manifests, and the [`PluginRuntime`]
//! that initializes plugins and drives the fetch pipeline.

pub mod builtin;
pub mod catalog;
pub mod command;
pub mod manifest;
pub mod reconcile;
pub mod registry;
pub mod runtime;

pub use catalog::{builtin_plugins, default_http_client, load_registry};
pub use command::CommandPlugin;
pub use manifest::{DiscoveredManifest, PluginManifest, discover_manifests, parse_plugin_manifest};
pub use reconcile::{ReloadAction, plan_reload};
pub use registry::{PluginEntry, PluginOrigin, PluginRegistry};
pub use runtime::{FetchReport, PluginFetchOutcome, PluginRuntime, PluginSummary, ReloadReport, headline_id};
