// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SoftwareContainer Agent Core daemon (`scd`).
//!
//! Background process that owns every live container (§4.10, §5).
//!
//! Architecture:
//! - Listener Task: accepts Unix socket connections, one spawned task per
//!   connection (§6).
//! - Agent Core: owns the container table, preload pool, job table, and
//!   signal bus; every RPC operation dispatches onto it.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod agent;
mod env;
mod event_bus;
mod listener;
mod protocol;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

use sc_engine::gateway::network::NetworkHostConfig;
use sc_engine::ManifestStore;

use crate::agent::{AgentConfig, AgentCore};
use crate::listener::Listener;

/// CLI flags for `scd` (§6). Argument parse failures exit 1;
/// `--help`/`--version` exit 0.
#[derive(Parser, Debug)]
#[command(name = "scd", version, about = "SoftwareContainer Agent Core daemon")]
struct Cli {
    /// Number of containers kept ready in the preload pool.
    #[arg(long, default_value_t = 0)]
    preload: usize,

    /// Default UID for a launched job when its request doesn't specify one.
    #[arg(long, default_value_t = 0)]
    user: u32,

    /// Destroy every live container on exit. Set to false to leave them
    /// running for debugging.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    shutdown: bool,

    /// Seconds to wait for graceful container shutdown before the hard-stop
    /// fallback (§4.1 `shutdown`).
    #[arg(long, default_value_t = 2)]
    timeout: u64,

    /// Directory (or single file) of service manifests to load at startup
    /// (§4.9). Unset means no capability is known until a
    /// `SetGatewayConfigs` raw-fragment call configures one directly.
    #[arg(long)]
    manifests: Option<PathBuf>,

    /// Overrides the Network gateway's host bridge name (default `sc-br0`).
    #[arg(long)]
    bridge: Option<String>,

    /// Workspace root containers are materialized under (§6 "Persistent
    /// state layout"), as `{root}/{container-id}/...`. Overrides
    /// `SC_WORKSPACE_ROOT` and the platform state-directory default.
    #[arg(long)]
    root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = parse_args();

    let workspace_root = env::workspace_root(cli.root.as_deref());
    std::fs::create_dir_all(&workspace_root)?;

    let _log_guard = setup_logging(&workspace_root)?;
    info!("starting SoftwareContainer Agent Core");

    let manifests = match &cli.manifests {
        Some(path) => ManifestStore::load_path(path)?,
        None => ManifestStore::empty(),
    };

    let mut network_host_config = NetworkHostConfig::default();
    if let Some(bridge) = cli.bridge.clone() {
        network_host_config.bridge_name = bridge;
    }

    let config = AgentConfig {
        workspace_root: workspace_root.clone(),
        preload_count: cli.preload,
        default_user: cli.user,
        shutdown_timeout: Duration::from_secs(cli.timeout),
        write_buffer: true,
        network_host_config,
    };

    let driver = Arc::new(sc_adapters::LxcContainerDriver::default());
    let netlink = Arc::new(sc_adapters::RtNetlinkClient::new());
    let agent = AgentCore::new(config, driver, netlink, manifests);

    let socket_path = env::socket_path(&workspace_root);
    let listener = Listener::bind(&socket_path, Arc::clone(&agent))?;
    tokio::spawn(listener.run());

    info!(socket = %socket_path.display(), preload = cli.preload, "listening");

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    // Ordered Agent shutdown (§5): every live container is destroyed
    // in the reverse of its creation order, unless --shutdown=false.
    agent.shutdown_all(cli.shutdown).await;
    info!("daemon stopped");
    Ok(())
}

/// Parses `std::env::args()`, exiting 1 on a usage error and 0 on
/// `--help`/`--version` (§6's CLI surface).
fn parse_args() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            let code = match e.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            std::process::exit(code);
        }
    }
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep (daemon.log.1, .2, .3).
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotates `workspace_root/daemon.log` if it has grown past
/// [`MAX_LOG_SIZE`]: shifts `.log` -> `.log.1` -> `.log.2` -> `.log.3`,
/// dropping the oldest. Best-effort: rotation failures are silently
/// ignored so the daemon still starts.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }
    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

fn setup_logging(
    workspace_root: &std::path::Path,
) -> Result<tracing_appender::non_blocking::WorkerGuard, std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_path = workspace_root.join("daemon.log");
    rotate_log_if_needed(&log_path);

    let file_appender = tracing_appender::rolling::never(workspace_root, "daemon.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
