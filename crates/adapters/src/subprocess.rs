// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution helpers shared by the container driver, netlink
//! in-namespace mutations, and the D-Bus gateway's proxy supervisor.

use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Default timeout for `lxc-*` driver commands (create/start/stop/destroy).
pub const DRIVER_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for `iptables`/`ip` filter and route commands.
pub const NETWORK_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for the D-Bus policy-proxy subprocess's socket to appear.
pub const DBUS_PROXY_READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Run a subprocess command with a timeout.
///
/// Wraps `Command::output()` with `tokio::time::timeout`, converting
/// timeout expiration into a descriptive error message. The child process
/// is killed automatically if the timeout elapses (via the tokio `Child`
/// drop implementation).
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, String> {
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(io_err)) => Err(format!("{} failed: {}", description, io_err)),
        Err(_elapsed) => Err(format!(
            "{} timed out after {}s",
            description,
            timeout.as_secs()
        )),
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
