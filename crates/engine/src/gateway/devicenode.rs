// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DeviceNode Gateway (§4.6): requests the driver expose each
//! configured device, then applies the digit-wise most-permissive mode
//! union across every configuration seen for that device (property P4).

use super::{require_nonempty, Gateway};
use crate::container::Container;
use crate::error::EngineError;
use async_trait::async_trait;
use parking_lot::Mutex;
use sc_core::{DeviceMode, DeviceNodeConfig, GatewayConfigError, GatewayKind, GatewayState};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

fn mode_to_u32(m: DeviceMode) -> u32 {
    (m.owner as u32) * 64 + (m.group as u32) * 8 + (m.other as u32)
}

pub struct DeviceNodeGateway {
    state: Mutex<GatewayState>,
    entries: Mutex<Vec<DeviceNodeConfig>>,
    /// Mode most recently applied to the driver for each device name.
    /// `resolve` always re-derives the union over every entry ever seen
    /// (property P4 needs the full history), but the driver only needs to
    /// hear about a device when it is new or its resolved mode grew (I2).
    applied: Mutex<HashMap<String, Option<DeviceMode>>>,
}

impl DeviceNodeGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GatewayState::Created),
            entries: Mutex::new(Vec::new()),
            applied: Mutex::new(HashMap::new()),
        }
    }

    fn resolve(&self) -> Vec<(String, Option<DeviceMode>)> {
        let entries = self.entries.lock().clone();
        let mut by_name: HashMap<String, Option<DeviceMode>> = HashMap::new();
        let mut order = Vec::new();
        for e in entries {
            if !order.contains(&e.name) {
                order.push(e.name.clone());
            }
            let slot = by_name.entry(e.name.clone()).or_insert(None);
            *slot = match (*slot, e.mode) {
                (Some(a), Some(b)) => Some(a.union(&b)),
                (None, Some(b)) => Some(b),
                (existing, None) => existing,
            };
        }
        order.into_iter().map(|name| (name.clone(), by_name[&name])).collect()
    }
}

impl Default for DeviceNodeGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Gateway for DeviceNodeGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::DeviceNode
    }

    fn state(&self) -> GatewayState {
        *self.state.lock()
    }

    fn read_config_element(&self, fragment: &Value) -> Result<(), GatewayConfigError> {
        let entry: DeviceNodeConfig =
            serde_json::from_value(fragment.clone()).map_err(|e| GatewayConfigError::FieldType {
                field: "devicenode".to_string(),
                expected: e.to_string(),
            })?;
        self.entries.lock().push(entry);
        *self.state.lock() = GatewayState::Configured;
        Ok(())
    }

    async fn activate(&self, container: &Container) -> Result<(), EngineError> {
        require_nonempty(self.entries.lock().is_empty())?;

        for (name, mode) in self.resolve() {
            let previous = self.applied.lock().get(&name).copied();
            if previous == Some(mode) {
                continue;
            }

            let host_path = Path::new("/dev").join(&name);
            let in_container = if previous.is_none() {
                container.mount_device(&host_path).await?
            } else {
                host_path
            };
            if let Some(mode) = mode {
                container.chmod_device(&in_container, mode_to_u32(mode)).await?;
            }
            self.applied.lock().insert(name, mode);
        }

        *self.state.lock() = GatewayState::Activated;
        Ok(())
    }

    async fn teardown(&self, _container: &Container) -> Result<(), EngineError> {
        *self.state.lock() = GatewayState::TornDown;
        Ok(())
    }
}

#[cfg(test)]
#[path = "devicenode_tests.rs"]
mod tests;
