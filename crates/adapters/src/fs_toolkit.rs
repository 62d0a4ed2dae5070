// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem Toolkit (C2): bind-mount, overlay-mount, tmpfs-mount,
//! shared-mount, write-file, create-dir-recursive. Each mutating operation
//! here returns the [`sc_core::CleanupHandler`] that inverts it; the caller
//! (sc-engine's Container lifecycle and gateways, which own the Cleanup
//! Stack) pushes it before control returns, per invariant I3.
//!
//! [`undo`] is the other half: it executes a handler's inverse during
//! drain, and is the only place in the workspace that calls `umount2`.

use nix::mount::{mount, umount2, MntFlags, MsFlags};
use sc_core::CleanupHandler;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsToolkitError {
    #[error("mount failed at `{path}`: {detail}")]
    MountFailed { path: PathBuf, detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn mount_err(path: &Path, e: nix::Error) -> FsToolkitError {
    FsToolkitError::MountFailed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    }
}

/// `mkdir -p`. Returns a handler that removes only the leaf directory on
/// rollback — ancestors created along the way are left in place, matching
/// the conservative choice other toolkits make for shared parent paths.
pub fn create_dir_recursive(path: &Path) -> Result<CleanupHandler, FsToolkitError> {
    std::fs::create_dir_all(path)?;
    Ok(CleanupHandler::DirectoryRemove {
        path: path.to_path_buf(),
    })
}

/// Creates an empty file (and its parent directories), truncating if it
/// already exists. Used for bind-mount staging targets and D-Bus socket
/// placeholders.
pub fn touch_file(path: &Path) -> Result<CleanupHandler, FsToolkitError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).write(true).truncate(false).open(path)?;
    Ok(CleanupHandler::FileUnlink {
        path: path.to_path_buf(),
    })
}

/// Writes (creating or truncating) a file's full contents.
pub fn write_file(path: &Path, contents: &[u8]) -> Result<CleanupHandler, FsToolkitError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
    file.write_all(contents)?;
    Ok(CleanupHandler::FileUnlink {
        path: path.to_path_buf(),
    })
}

/// Appends to a file, creating it (and parents) if absent. Used by
/// `Container::setEnvironmentVariable`'s diagnostic `export` lines
/// (§4.1), which accumulate across calls rather than truncating.
pub fn append_file(path: &Path, contents: &str) -> Result<CleanupHandler, FsToolkitError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(contents.as_bytes())?;
    Ok(CleanupHandler::FileUnlink {
        path: path.to_path_buf(),
    })
}

/// Bind-mounts `host` onto `target`. Callers remount read-only afterwards
/// via [`remount_readonly`] when required (§4.1 step 7).
pub fn bind_mount(host: &Path, target: &Path) -> Result<CleanupHandler, FsToolkitError> {
    mount(
        Some(host),
        target,
        None::<&str>,
        MsFlags::MS_BIND,
        None::<&str>,
    )
    .map_err(|e| mount_err(target, e))?;
    Ok(CleanupHandler::UnmountLazy {
        path: target.to_path_buf(),
    })
}

/// Remounts an existing bind mount read-only in place (no new handler: the
/// original bind mount's unmount already covers this mount point).
pub fn remount_readonly(target: &Path) -> Result<(), FsToolkitError> {
    mount(
        None::<&str>,
        target,
        None::<&str>,
        MsFlags::MS_BIND | MsFlags::MS_REMOUNT | MsFlags::MS_RDONLY,
        None::<&str>,
    )
    .map_err(|e| mount_err(target, e))
}

/// Marks `path` (which must already be a mount point) as a shared mount
/// point, so mount propagation from the host reaches the container
/// (§4.1, §9: "the move through the shared gateway directory is
/// load-bearing"). No cleanup handler: the original mount's unmount
/// already tears this down.
pub fn make_shared(path: &Path) -> Result<(), FsToolkitError> {
    mount(
        None::<&str>,
        path,
        None::<&str>,
        MsFlags::MS_SHARED,
        None::<&str>,
    )
    .map_err(|e| mount_err(path, e))
}

/// Moves a mount from `from` to `to` (`MS_MOVE`), the final step of the
/// bind-mount-into-container algorithm (§4.1 step 6).
pub fn mount_move(from: &Path, to: &Path) -> Result<CleanupHandler, FsToolkitError> {
    mount(
        Some(from),
        to,
        None::<&str>,
        MsFlags::MS_MOVE,
        None::<&str>,
    )
    .map_err(|e| mount_err(to, e))?;
    Ok(CleanupHandler::UnmountLazy {
        path: to.to_path_buf(),
    })
}

/// Mounts a tmpfs at `target`, used by gateways that need a scratch area
/// with no persistent backing (e.g. the gateway directory itself before
/// it becomes a shared mount point).
pub fn tmpfs_mount(target: &Path) -> Result<CleanupHandler, FsToolkitError> {
    mount(
        Some("tmpfs"),
        target,
        Some("tmpfs"),
        MsFlags::empty(),
        None::<&str>,
    )
    .map_err(|e| mount_err(target, e))?;
    Ok(CleanupHandler::UnmountLazy {
        path: target.to_path_buf(),
    })
}

/// Mounts an overlay filesystem combining `lower`/`upper`/`work` at
/// `target`, for the container's write-buffer rootfs (§4.1 `create`).
pub fn overlay_mount(
    lower: &Path,
    upper: &Path,
    work: &Path,
    target: &Path,
) -> Result<CleanupHandler, FsToolkitError> {
    let data = format!(
        "lowerdir={},upperdir={},workdir={}",
        lower.display(),
        upper.display(),
        work.display()
    );
    mount(
        Some("overlay"),
        target,
        Some("overlay"),
        MsFlags::empty(),
        Some(data.as_str()),
    )
    .map_err(|e| mount_err(target, e))?;
    Ok(CleanupHandler::UnmountLazy {
        path: target.to_path_buf(),
    })
}

/// Syncs an overlay's upper layer to disk. `undo` always runs
/// `OverlaySync` before the `UnmountLazy` pushed for the same overlay,
/// so the flush reaches disk while the mount is still live.
pub fn sync_overlay(upper: &Path) -> Result<(), FsToolkitError> {
    let dir = std::fs::File::open(upper)?;
    dir.sync_all()?;
    Ok(())
}

/// Executes a [`CleanupHandler`]'s inverse. Per-handler failures are the
/// caller's (the Cleanup Stack's) concern to log and continue past; this
/// function just reports success or failure for one handler.
pub fn undo(handler: &CleanupHandler) -> Result<(), FsToolkitError> {
    match handler {
        CleanupHandler::DirectoryRemove { path } => {
            std::fs::remove_dir(path).or_else(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Ok(())
                } else {
                    Err(e)
                }
            })?;
            Ok(())
        }
        CleanupHandler::FileUnlink { path } => {
            std::fs::remove_file(path).or_else(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Ok(())
                } else {
                    Err(e)
                }
            })?;
            Ok(())
        }
        CleanupHandler::UnmountLazy { path } => {
            umount2(path, MntFlags::MNT_DETACH).or_else(|e| {
                if e == nix::Error::EINVAL {
                    // Not a mount point (already torn down, or never mounted
                    // because an earlier step in the same call failed).
                    Ok(())
                } else {
                    Err(e)
                }
            })
            .map_err(|e| mount_err(path, e))
        }
        CleanupHandler::OverlaySync { src, dst: _ } => sync_overlay(src),
        CleanupHandler::ProcessTerminate { .. }
        | CleanupHandler::IptablesRuleDelete { .. }
        | CleanupHandler::AudioModuleUnload { .. } => {
            // These three variants need the container driver / iptables
            // client / audio subsystem, not the filesystem toolkit; the
            // Cleanup Stack dispatches them itself (see sc-engine::cleanup).
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "fs_toolkit_tests.rs"]
mod tests;
