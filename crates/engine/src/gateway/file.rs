// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File Gateway: the raw `bindMountInContainer` surface exposed as
//! manifest-driven configuration, so a capability can stage host files into
//! a container without a `BindMountFolderInContainer` RPC round-trip.

use super::{require_nonempty, Gateway};
use crate::container::Container;
use crate::error::EngineError;
use async_trait::async_trait;
use parking_lot::Mutex;
use sc_core::{GatewayConfigError, GatewayKind, GatewayState};
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
struct FileEntry {
    host_path: PathBuf,
    container_path: PathBuf,
    #[serde(default)]
    read_only: bool,
}

pub struct FileGateway {
    state: Mutex<GatewayState>,
    entries: Mutex<Vec<FileEntry>>,
    /// Count of `entries` already bind-mounted by a prior `activate` call;
    /// only entries past this mark are mounted on the next one (I2).
    applied: Mutex<usize>,
}

impl FileGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GatewayState::Created),
            entries: Mutex::new(Vec::new()),
            applied: Mutex::new(0),
        }
    }
}

impl Default for FileGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Gateway for FileGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::File
    }

    fn state(&self) -> GatewayState {
        *self.state.lock()
    }

    fn read_config_element(&self, fragment: &Value) -> Result<(), GatewayConfigError> {
        let entry: FileEntry =
            serde_json::from_value(fragment.clone()).map_err(|e| GatewayConfigError::FieldType {
                field: "file".to_string(),
                expected: e.to_string(),
            })?;
        self.entries.lock().push(entry);
        *self.state.lock() = GatewayState::Configured;
        Ok(())
    }

    async fn activate(&self, container: &Container) -> Result<(), EngineError> {
        let entries = self.entries.lock().clone();
        require_nonempty(entries.is_empty())?;
        let start = *self.applied.lock();

        for entry in &entries[start..] {
            container
                .bind_mount_in_container(&entry.host_path, &entry.container_path, entry.read_only)
                .await?;
        }

        *self.applied.lock() = entries.len();
        *self.state.lock() = GatewayState::Activated;
        Ok(())
    }

    async fn teardown(&self, _container: &Container) -> Result<(), EngineError> {
        // The bind mounts this gateway created live inside the container's
        // own mount namespace and are torn down with it; nothing to unwind
        // here beyond what `bind_mount_in_container`'s own cleanup handlers
        // already cover.
        *self.state.lock() = GatewayState::TornDown;
        Ok(())
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
