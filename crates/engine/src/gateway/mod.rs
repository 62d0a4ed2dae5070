// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway Framework (C6): the abstract `Created -> Configured -> Activated
//! -> TornDown` lifecycle shared by every concrete gateway (§4.3), plus
//! [`GatewaySet`], which owns one of each kind for a Container and drives
//! them in the fixed activation order.

pub mod cgroups;
pub mod dbus;
pub mod devicenode;
pub mod environment;
pub mod file;
pub mod network;
pub mod pulse;
pub mod wayland;

use crate::container::Container;
use crate::error::EngineError;
use crate::gateway::network::NetworkHostConfig;
use async_trait::async_trait;
use sc_adapters::NetlinkClient;
use sc_core::{GatewayActivationError, GatewayConfigError, GatewayKind, GatewayState};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// One policy engine configuring a single host/kernel facility for a
/// Container (§4.3). Implementations hold their own accumulated
/// configuration and activation state; `activate`/`teardown` receive the
/// Container as a non-owning reference, used only for the call's duration.
#[async_trait]
pub trait Gateway: Send + Sync {
    fn kind(&self) -> GatewayKind;

    fn state(&self) -> GatewayState;

    /// Accumulates one JSON config fragment. Called zero or more times
    /// before `activate`. Must be pure with respect to side effects outside
    /// the gateway's own fields.
    fn read_config_element(&self, fragment: &Value) -> Result<(), GatewayConfigError>;

    /// Performs the real side effects using `container`. Requires at least
    /// one successful `read_config_element` (empty state is rejected).
    async fn activate(&self, container: &Container) -> Result<(), EngineError>;

    /// Reverses `activate`. Called at most once per `activate`, and in the
    /// reverse of the fixed activation order (§4.3, §5 O2).
    async fn teardown(&self, container: &Container) -> Result<(), EngineError>;
}

/// Owns one gateway instance per kind for a single Container and drives
/// them through the fixed activation order (§4.3): Environment,
/// Network, Cgroups, DeviceNode, File, D-Bus, Pulse, Wayland. Teardown runs
/// the reverse.
pub struct GatewaySet {
    gateways: HashMap<GatewayKind, Box<dyn Gateway>>,
}

impl GatewaySet {
    /// Builds the full fixed set, one gateway per kind, all starting in
    /// `Created` with no accumulated configuration. `netlink`, `host_config`
    /// and `container_index` are the host-side facts the Network Gateway
    /// needs but that no manifest fragment configures (§4.4); the Agent
    /// Core supplies them when it builds a Container's set.
    pub fn new(netlink: Arc<dyn NetlinkClient>, host_config: NetworkHostConfig, container_index: u32) -> Self {
        let mut gateways: HashMap<GatewayKind, Box<dyn Gateway>> = HashMap::new();
        gateways.insert(GatewayKind::Environment, Box::new(environment::EnvironmentGateway::new()));
        gateways.insert(
            GatewayKind::Network,
            Box::new(network::NetworkGateway::new(netlink, host_config, container_index)),
        );
        gateways.insert(GatewayKind::Cgroups, Box::new(cgroups::CgroupsGateway::new()));
        gateways.insert(GatewayKind::DeviceNode, Box::new(devicenode::DeviceNodeGateway::new()));
        gateways.insert(GatewayKind::File, Box::new(file::FileGateway::new()));
        gateways.insert(GatewayKind::DBus, Box::new(dbus::DBusGateway::new()));
        gateways.insert(GatewayKind::Pulse, Box::new(pulse::PulseGateway::new()));
        gateways.insert(GatewayKind::Wayland, Box::new(wayland::WaylandGateway::new()));
        Self { gateways }
    }

    pub fn get(&self, kind: GatewayKind) -> &dyn Gateway {
        self.gateways[&kind].as_ref()
    }

    /// Feeds one JSON fragment to the gateway named by its stable ID.
    /// Unknown IDs are rejected with `GatewayConfigError::FieldMissing`
    /// (the caller, the Manifest Store, already filters these, but a
    /// `SetGatewayConfigs` raw-fragment call can name one directly).
    pub fn read_config_element(&self, gateway_id: &str, fragment: &Value) -> Result<(), GatewayConfigError> {
        let kind = GatewayKind::from_id(gateway_id)
            .ok_or_else(|| GatewayConfigError::FieldMissing(format!("unknown gateway id `{gateway_id}`")))?;
        self.gateways[&kind].read_config_element(fragment)
    }

    /// Activates every gateway with accumulated configuration, in the fixed
    /// order. On the first failure, rolls back the gateways already
    /// activated in this call, in reverse order, and returns the original
    /// error (§7's `SetCapabilities` propagation policy).
    pub async fn activate_all(&self, container: &Container) -> Result<(), EngineError> {
        let mut activated = Vec::new();
        for kind in GatewayKind::ACTIVATION_ORDER {
            let gateway = self.gateways[&kind].as_ref();
            if gateway.state() != GatewayState::Configured {
                continue;
            }
            match gateway.activate(container).await {
                Ok(()) => {
                    info!(gateway = kind.id(), "gateway activated");
                    activated.push(kind);
                }
                Err(e) => {
                    warn!(gateway = kind.id(), error = %e, "gateway activation failed, rolling back");
                    for prior in activated.into_iter().rev() {
                        if let Err(te) = self.gateways[&prior].teardown(container).await {
                            warn!(gateway = prior.id(), error = %te, "rollback teardown failed");
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Tears down every activated gateway, in reverse activation order.
    /// Best-effort: failures are logged and do not stop the sequence.
    pub async fn teardown_all(&self, container: &Container) {
        for kind in GatewayKind::ACTIVATION_ORDER.into_iter().rev() {
            let gateway = self.gateways[&kind].as_ref();
            if gateway.state() != GatewayState::Activated {
                continue;
            }
            if let Err(e) = gateway.teardown(container).await {
                warn!(gateway = kind.id(), error = %e, "gateway teardown failed, continuing");
            }
        }
    }
}

/// Maps an activation precondition failure (empty accumulated config) to
/// the matching named error.
pub(crate) fn require_nonempty(is_empty: bool) -> Result<(), EngineError> {
    if is_empty {
        Err(GatewayActivationError::Precondition("gateway has no accumulated configuration".to_string()).into())
    } else {
        Ok(())
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
