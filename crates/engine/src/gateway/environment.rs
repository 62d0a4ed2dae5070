// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment Gateway (§4.7): `set`/`append`/`prepend` semantics over
//! the Container's environment map.

use super::{require_nonempty, Gateway};
use crate::container::Container;
use crate::error::EngineError;
use async_trait::async_trait;
use parking_lot::Mutex;
use sc_core::{EnvEntry, EnvMode, GatewayActivationError, GatewayConfigError, GatewayKind, GatewayState};
use serde_json::Value;
use tracing::info;

pub struct EnvironmentGateway {
    state: Mutex<GatewayState>,
    entries: Mutex<Vec<EnvEntry>>,
    /// Count of `entries` already applied by a prior `activate` call. Only
    /// the entries past this mark are acted on, so a later `SetCapabilities`
    /// call that adds more entries and re-activates does not redo the
    /// earlier ones (invariant I2).
    applied: Mutex<usize>,
}

impl EnvironmentGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GatewayState::Created),
            entries: Mutex::new(Vec::new()),
            applied: Mutex::new(0),
        }
    }
}

impl Default for EnvironmentGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Gateway for EnvironmentGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Environment
    }

    fn state(&self) -> GatewayState {
        *self.state.lock()
    }

    fn read_config_element(&self, fragment: &Value) -> Result<(), GatewayConfigError> {
        let entry: EnvEntry =
            serde_json::from_value(fragment.clone()).map_err(|e| GatewayConfigError::FieldType {
                field: "env".to_string(),
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
            let existing = container.environment().get(&entry.name).cloned();
            let new_value = match (entry.mode, &existing) {
                (EnvMode::Set, Some(_)) => {
                    return Err(GatewayActivationError::Precondition(format!(
                        "`{}` is already set; `set` mode refuses to overwrite",
                        entry.name
                    ))
                    .into());
                }
                (EnvMode::Set, None) => entry.value.clone(),
                (EnvMode::Append, None) => {
                    info!(name = %entry.name, "environment variable created by append");
                    entry.value.clone()
                }
                (EnvMode::Append, Some(existing)) => {
                    format!("{existing}{}{}", entry.separator, entry.value)
                }
                (EnvMode::Prepend, None) => {
                    info!(name = %entry.name, "environment variable created by prepend");
                    entry.value.clone()
                }
                (EnvMode::Prepend, Some(existing)) => {
                    format!("{}{}{existing}", entry.value, entry.separator)
                }
            };
            container.set_environment_variable(&entry.name, &new_value)?;
        }

        *self.applied.lock() = entries.len();
        *self.state.lock() = GatewayState::Activated;
        Ok(())
    }

    async fn teardown(&self, _container: &Container) -> Result<(), EngineError> {
        *self.state.lock() = GatewayState::TornDown;
        Ok(())
    }
}

#[cfg(test)]
#[path = "environment_tests.rs"]
mod tests;
