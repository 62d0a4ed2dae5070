// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle state enums for Containers and Gateways (see §4.1, §4.3).

use serde::{Deserialize, Serialize};

/// Container lifecycle state. Transitions: `Default -> Prepared -> Created ->
/// Started -> (Frozen <-> Started) -> Destroyed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerState {
    Default,
    Prepared,
    Created,
    Started,
    Frozen,
    Destroyed,
}

impl ContainerState {
    /// Name used in `ContainerError::StateMismatch`/`Timeout` messages.
    pub fn name(&self) -> &'static str {
        match self {
            ContainerState::Default => "Default",
            ContainerState::Prepared => "Prepared",
            ContainerState::Created => "Created",
            ContainerState::Started => "Started",
            ContainerState::Frozen => "Frozen",
            ContainerState::Destroyed => "Destroyed",
        }
    }

    /// Whether `initialize` (Default -> Prepared) is idempotent from here.
    pub fn is_prepared_or_later(&self) -> bool {
        !matches!(self, ContainerState::Default)
    }

    pub fn is_at_least_created(&self) -> bool {
        matches!(
            self,
            ContainerState::Created | ContainerState::Started | ContainerState::Frozen
        )
    }
}

/// Gateway lifecycle state. Teardown is called in reverse order of activate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GatewayState {
    Created,
    Configured,
    Activated,
    TornDown,
}

impl GatewayState {
    pub fn name(&self) -> &'static str {
        match self {
            GatewayState::Created => "Created",
            GatewayState::Configured => "Configured",
            GatewayState::Activated => "Activated",
            GatewayState::TornDown => "TornDown",
        }
    }
}

/// The fixed set of gateway kinds and their activation order (§4.3).
/// Teardown proceeds in the reverse of this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GatewayKind {
    Environment,
    Network,
    Cgroups,
    DeviceNode,
    File,
    DBus,
    Pulse,
    Wayland,
}

impl GatewayKind {
    /// The stable ID string used in manifests (§3: `network`, `cgroups`,
    /// `devicenode`, `env`, `dbus`, `file`, `pulse`, `wayland`).
    pub fn id(&self) -> &'static str {
        match self {
            GatewayKind::Environment => "env",
            GatewayKind::Network => "network",
            GatewayKind::Cgroups => "cgroups",
            GatewayKind::DeviceNode => "devicenode",
            GatewayKind::File => "file",
            GatewayKind::DBus => "dbus",
            GatewayKind::Pulse => "pulse",
            GatewayKind::Wayland => "wayland",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "env" => Some(GatewayKind::Environment),
            "network" => Some(GatewayKind::Network),
            "cgroups" => Some(GatewayKind::Cgroups),
            "devicenode" => Some(GatewayKind::DeviceNode),
            "file" => Some(GatewayKind::File),
            "dbus" => Some(GatewayKind::DBus),
            "pulse" => Some(GatewayKind::Pulse),
            "wayland" => Some(GatewayKind::Wayland),
            _ => None,
        }
    }

    /// Activation order fixed by §4.3, reused for teardown in reverse.
    pub const ACTIVATION_ORDER: [GatewayKind; 8] = [
        GatewayKind::Environment,
        GatewayKind::Network,
        GatewayKind::Cgroups,
        GatewayKind::DeviceNode,
        GatewayKind::File,
        GatewayKind::DBus,
        GatewayKind::Pulse,
        GatewayKind::Wayland,
    ];
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
