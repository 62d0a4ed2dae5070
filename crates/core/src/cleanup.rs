// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Cleanup Handler tagged union (§3, §4.2). Each variant carries
//! enough data to be inverted without reference to any other live object.

use std::path::PathBuf;

/// A single reversible side effect, pushed onto the Cleanup Stack at the
/// site it is performed and drained in LIFO order on rollback, destroy, or
/// agent shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupHandler {
    /// Remove an empty directory created during setup.
    DirectoryRemove { path: PathBuf },
    /// Unlink a file created during setup.
    FileUnlink { path: PathBuf },
    /// Lazily unmount a mount point (`MNT_DETACH`).
    UnmountLazy { path: PathBuf },
    /// Sync an overlay's upper layer back before it is unmounted.
    OverlaySync { src: PathBuf, dst: PathBuf },
    /// Terminate a subprocess by PID.
    ProcessTerminate { pid: i32 },
    /// Delete a previously-inserted iptables rule, identified by the handle
    /// returned when it was inserted.
    IptablesRuleDelete { handle: String },
    /// Unload a previously-loaded audio module.
    AudioModuleUnload { index: u32 },
}

impl CleanupHandler {
    /// Name used in structured log fields when a handler's undo fails.
    pub fn kind(&self) -> &'static str {
        match self {
            CleanupHandler::DirectoryRemove { .. } => "directory_remove",
            CleanupHandler::FileUnlink { .. } => "file_unlink",
            CleanupHandler::UnmountLazy { .. } => "unmount_lazy",
            CleanupHandler::OverlaySync { .. } => "overlay_sync",
            CleanupHandler::ProcessTerminate { .. } => "process_terminate",
            CleanupHandler::IptablesRuleDelete { .. } => "iptables_rule_delete",
            CleanupHandler::AudioModuleUnload { .. } => "audio_module_unload",
        }
    }

    /// The filesystem path this handler targets, if any — used for the
    /// duplicate-path suppression rule in §4.2 (File/Directory removes
    /// only; mount handlers are never deduplicated).
    pub fn dedup_path(&self) -> Option<&PathBuf> {
        match self {
            CleanupHandler::DirectoryRemove { path } => Some(path),
            CleanupHandler::FileUnlink { path } => Some(path),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "cleanup_tests.rs"]
mod tests;
