// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wayland Gateway: a stub, mirroring [`super::pulse::PulseGateway`].
//! Display routing is specified no further than the interface shape
//! every gateway shares (§1, §2).

use super::{require_nonempty, Gateway};
use crate::container::Container;
use crate::error::EngineError;
use async_trait::async_trait;
use parking_lot::Mutex;
use sc_core::{GatewayConfigError, GatewayKind, GatewayState};
use serde_json::Value;
use tracing::info;

pub struct WaylandGateway {
    state: Mutex<GatewayState>,
    fragments: Mutex<Vec<Value>>,
}

impl WaylandGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GatewayState::Created),
            fragments: Mutex::new(Vec::new()),
        }
    }
}

impl Default for WaylandGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Gateway for WaylandGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Wayland
    }

    fn state(&self) -> GatewayState {
        *self.state.lock()
    }

    fn read_config_element(&self, fragment: &Value) -> Result<(), GatewayConfigError> {
        self.fragments.lock().push(fragment.clone());
        *self.state.lock() = GatewayState::Configured;
        Ok(())
    }

    async fn activate(&self, _container: &Container) -> Result<(), EngineError> {
        require_nonempty(self.fragments.lock().is_empty())?;
        info!(count = self.fragments.lock().len(), "wayland gateway activated (stub)");
        *self.state.lock() = GatewayState::Activated;
        Ok(())
    }

    async fn teardown(&self, _container: &Container) -> Result<(), EngineError> {
        *self.state.lock() = GatewayState::TornDown;
        Ok(())
    }
}

#[cfg(test)]
#[path = "wayland_tests.rs"]
mod tests;
