// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sc-core: data types and error taxonomy for the SoftwareContainer runtime.
//! No I/O and no async here — just the shapes everything else agrees on.

pub mod capability;
pub mod cleanup;
pub mod error;
pub mod gateway_config;
pub mod id;
pub mod ids;
pub mod job;
pub mod state;

pub use capability::{configs_for, merge_capabilities, parse_capabilities, Capability, GatewayConfiguration};
pub use cleanup::CleanupHandler;
pub use error::{ContainerError, GatewayActivationError, GatewayConfigError, ManifestError, ResourceError};
pub use gateway_config::{
    CgroupSetting, DBusConfig, DeviceMode, DeviceNodeConfig, EnvEntry, EnvMode, NetworkDirection,
    NetworkEntry, NetworkRule, PortSpec, Protocol, ProtocolSpec,
};
pub use id::{IdGen, ShortId, UuidIdGen};
pub use ids::{CapabilityName, ContainerHandle, ContainerId};
pub use job::{JobConfig, JobRecord, StdioSpec};
pub use state::{ContainerState, GatewayKind, GatewayState};
