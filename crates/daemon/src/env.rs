// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable and platform-directory access for the
//! daemon crate.

use std::path::PathBuf;

/// Resolve the workspace root containers are materialized under (§6
/// "Persistent state layout"): `--root` if given, else `SC_WORKSPACE_ROOT`
/// if set, otherwise the platform's state directory (via the `dirs` crate)
/// joined with `softwarecontainer`.
pub fn workspace_root(cli_root: Option<&std::path::Path>) -> PathBuf {
    if let Some(root) = cli_root {
        return root.to_path_buf();
    }
    if let Ok(dir) = std::env::var("SC_WORKSPACE_ROOT") {
        return PathBuf::from(dir);
    }
    dirs::state_dir()
        .or_else(dirs::data_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("softwarecontainer")
}

/// Unix socket path the listener binds to, under the workspace root.
pub fn socket_path(workspace_root: &std::path::Path) -> PathBuf {
    workspace_root.join("agent.sock")
}
