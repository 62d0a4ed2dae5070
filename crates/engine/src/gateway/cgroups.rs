// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cgroups Gateway (§4.5): whitelist policy over cgroup settings.
//! `memory.limit_in_bytes` resolves to the most permissive (highest) value
//! seen across all configurations (property P3); unrecognised keys resolve
//! to the last value applied, with a warning.

use super::{require_nonempty, Gateway};
use crate::container::Container;
use crate::error::EngineError;
use async_trait::async_trait;
use parking_lot::Mutex;
use sc_core::{CgroupSetting, GatewayConfigError, GatewayKind, GatewayState};
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// Cgroup settings for which repeated configuration resolves to the
/// maximum numeric value rather than last-wins (§4.5).
const MONOTONIC_SETTINGS: &[&str] = &["memory.limit_in_bytes"];

/// Best-effort default to restore a monotonic setting to if activation
/// fails partway through and the setting was never applied before this
/// call. Only `memory.limit_in_bytes` has a driver-independent "undo"
/// value (unbounded); settings outside `MONOTONIC_SETTINGS` have no
/// knowable default and are left at whatever was last applied (see
/// DESIGN.md).
fn default_value(setting: &str) -> Option<&'static str> {
    match setting {
        "memory.limit_in_bytes" => Some("max"),
        _ => None,
    }
}

pub struct CgroupsGateway {
    state: Mutex<GatewayState>,
    settings: Mutex<Vec<CgroupSetting>>,
    /// Value most recently applied to the driver for each setting; only a
    /// setting whose resolved value changed since the last `activate` is
    /// re-applied (I2), and only this subset needs rolling back on a
    /// mid-sequence failure.
    applied: Mutex<HashMap<String, String>>,
}

impl CgroupsGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GatewayState::Created),
            settings: Mutex::new(Vec::new()),
            applied: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves the accumulated settings to one final value per key,
    /// applying the monotonic-maximum rule for known bounded resources and
    /// last-wins for everything else.
    fn resolve(&self) -> Result<Vec<(String, String)>, EngineError> {
        let settings = self.settings.lock().clone();
        let mut resolved: HashMap<String, String> = HashMap::new();
        let mut order: Vec<String> = Vec::new();

        for s in settings {
            if MONOTONIC_SETTINGS.contains(&s.setting.as_str()) {
                let candidate: u64 = s.value.parse().map_err(|_| {
                    sc_core::GatewayConfigError::FieldType {
                        field: s.setting.clone(),
                        expected: "integer byte count".to_string(),
                    }
                })?;
                let slot = resolved.entry(s.setting.clone()).or_insert_with(|| "0".to_string());
                let current: u64 = slot.parse().unwrap_or(0);
                if candidate > current {
                    *slot = candidate.to_string();
                }
            } else {
                warn!(setting = %s.setting, "unrecognised cgroup setting, last value wins");
                resolved.insert(s.setting.clone(), s.value.clone());
            }
            if !order.contains(&s.setting) {
                order.push(s.setting.clone());
            }
        }

        Ok(order
            .into_iter()
            .map(|k| {
                let v = resolved[&k].clone();
                (k, v)
            })
            .collect())
    }
}

impl Default for CgroupsGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Gateway for CgroupsGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Cgroups
    }

    fn state(&self) -> GatewayState {
        *self.state.lock()
    }

    fn read_config_element(&self, fragment: &Value) -> Result<(), GatewayConfigError> {
        let setting: CgroupSetting =
            serde_json::from_value(fragment.clone()).map_err(|e| GatewayConfigError::FieldType {
                field: "cgroups".to_string(),
                expected: e.to_string(),
            })?;
        self.settings.lock().push(setting);
        *self.state.lock() = GatewayState::Configured;
        Ok(())
    }

    async fn activate(&self, container: &Container) -> Result<(), EngineError> {
        require_nonempty(self.settings.lock().is_empty())?;
        let resolved = self.resolve()?;

        let already = self.applied.lock().clone();
        let changed: Vec<(String, String)> = resolved
            .into_iter()
            .filter(|(setting, value)| already.get(setting) != Some(value))
            .collect();

        let mut applied_this_call = Vec::new();
        for (setting, value) in &changed {
            match container.set_cgroup_item(setting, value).await {
                Ok(()) => {
                    let prior = already.get(setting).cloned();
                    applied_this_call.push((setting.clone(), prior));
                    self.applied.lock().insert(setting.clone(), value.clone());
                }
                Err(e) => {
                    for (setting, prior) in applied_this_call.into_iter().rev() {
                        let rollback = prior.clone().or_else(|| default_value(&setting).map(str::to_string));
                        match rollback {
                            Some(value) => {
                                if let Err(re) = container.set_cgroup_item(&setting, &value).await {
                                    warn!(%setting, error = %re, "cgroups rollback to prior value failed");
                                } else {
                                    self.applied.lock().insert(setting.clone(), value);
                                }
                            }
                            None => {
                                warn!(%setting, "cgroups activation failed partway; no prior value or known default, setting left as applied");
                            }
                        }
                    }
                    return Err(e);
                }
            }
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
#[path = "cgroups_tests.rs"]
mod tests;
