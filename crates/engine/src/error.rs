// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine-local error union. sc-core defines the named error *kinds* of
//! §7; this is the single type sc-engine's public functions return,
//! converting adapter-local failures (`DriverError`, `FsToolkitError`,
//! `NetlinkError`) into the matching sc-core kind at the boundary where
//! that error-propagation policy applies, keeping engine-local wiring
//! errors separate from sc-core's domain errors.

use sc_adapters::{DriverError, FsToolkitError, NetlinkError};
use sc_core::{ContainerError, GatewayActivationError, GatewayConfigError, ManifestError, ResourceError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error(transparent)]
    GatewayConfig(#[from] GatewayConfigError),
    #[error(transparent)]
    GatewayActivation(#[from] GatewayActivationError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// Converts a driver failure at stage `stage` into `ContainerError::DriverFailed`.
pub fn driver_failed(stage: &'static str, e: DriverError) -> EngineError {
    ContainerError::DriverFailed {
        stage,
        detail: e.to_string(),
    }
    .into()
}

/// Converts a filesystem-toolkit failure into `ResourceError::MountFailed`.
pub fn mount_failed(path: impl Into<String>, e: FsToolkitError) -> EngineError {
    let _ = e;
    ResourceError::MountFailed(path.into()).into()
}

/// Converts a netlink failure into `GatewayActivationError::KernelCallFailed`.
pub fn netlink_failed(op: &'static str, e: NetlinkError) -> EngineError {
    GatewayActivationError::KernelCallFailed {
        op,
        detail: e.to_string(),
    }
    .into()
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
