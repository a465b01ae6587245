// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Herald - a plugin-driven headline curator.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use herald::ServiceController;
use herald::commands::{run_fetch, run_plugins, run_status, run_stop};
use herald_config::{ConfigManager, HeraldConfig, render_errors, resolve_config_path};
use herald_core::HeraldError;
use tracing::error;

/// Herald - a plugin-driven headline curator.
#[derive(Parser, Debug)]
#[command(name = "herald", version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: ./herald.toml, then the user config dir).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the service in the foreground until SIGINT/SIGTERM.
    Start,
    /// Stop a service running in another process.
    Stop,
    /// Show whether the service is running.
    Status {
        /// Print machine-readable JSON.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Fetch now, without the scheduler.
    Fetch {
        /// Fetch only this plugin.
        #[arg(long, value_name = "ID")]
        plugin: Option<String>,
    },
    /// List loaded plugins and their run state.
    Plugins {
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("herald={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

/// Defaults, file, and `HERALD_*` environment overrides; exits on invalid config.
fn load_or_exit(path: &Path) -> HeraldConfig {
    match herald_config::load_and_validate(path) {
        Ok(config) => config,
        Err(errors) => {
            render_errors(&errors);
            std::process::exit(1);
        }
    }
}

async fn run_start(path: PathBuf) -> Result<(), HeraldError> {
    let manager = match ConfigManager::open(&path) {
        Ok(manager) => Arc::new(manager),
        Err(errors) => {
            render_errors(&errors);
            std::process::exit(1);
        }
    };
    init_tracing(&manager.current().service.log_level);

    let controller = ServiceController::new(manager);
    let shutdown = controller.start().await?;
    shutdown.cancelled().await;
    controller.stop().await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let path = resolve_config_path(cli.config.as_deref());

    let result = match cli.command {
        Commands::Start => run_start(path).await,
        command => {
            let config = load_or_exit(&path);
            let quiet = matches!(command, Commands::Status { .. } | Commands::Stop);
            init_tracing(if quiet { "warn" } else { config.service.log_level.as_str() });
            match command {
                Commands::Stop => run_stop(&config).await,
                Commands::Status { json, plain } => run_status(&config, json, plain).await,
                Commands::Fetch { plugin } => run_fetch(Arc::new(config), plugin.as_deref()).await,
                Commands::Plugins { json } => run_plugins(Arc::new(config), json).await,
                Commands::Start => Ok(()),
            }
        }
    };

    if let Err(e) = result {
        error!(error = %e, "command failed");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
