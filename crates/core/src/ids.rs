// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier newtypes used across the container runtime.

crate::define_id! {
    /// Unique identifier for a Container, assigned at creation time.
    pub struct ContainerId;
}

crate::define_id! {
    /// Dotted capability name, e.g. `com.vendor.temperature.read`.
    pub struct CapabilityName;
}

/// Numeric handle returned to RPC callers for a Container. Handles index
/// the Agent Core's container table and are never reused within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct ContainerHandle(pub u32);

impl std::fmt::Display for ContainerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[path = "ids_tests.rs"]
mod tests;
