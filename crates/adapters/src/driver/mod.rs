// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ContainerDriver` (C4): a thin adapter over the underlying OS container
//! primitive, treating the low-level container runtime (liblxc or
//! equivalent) as an external, FFI-like collaborator. This trait
//! is the seam sc-engine's Container lifecycle (C5) programs against, and
//! [`LxcContainerDriver`] is the thin wrapper that shells out to the
//! `lxc-*` CLI tools rather than linking the library directly, so the
//! workspace stays free of `unsafe` FFI bindings.

mod lxc;

#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use lxc::LxcContainerDriver;

#[cfg(any(test, feature = "test-support"))]
pub use fake::{DriverCall, FakeContainerDriver};

use async_trait::async_trait;
use sc_core::{ContainerId, JobConfig};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors surfaced by a `ContainerDriver`. sc-engine converts these into
/// `sc_core::ContainerError`/`GatewayActivationError` at the boundary where
/// that error-propagation policy (§7) applies.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("driver command `{stage}` failed: {detail}")]
    CommandFailed { stage: &'static str, detail: String },

    #[error("driver command `{stage}` timed out")]
    Timeout { stage: &'static str },

    #[error("container `{0}` not known to the driver")]
    NotFound(String),

    #[error("pid {0} is not a live job")]
    NoSuchJob(i32),
}

/// Coarse container state as reported by the driver (§4.1's
/// `Running`/`Stopped`/etc, queried by `start`'s bounded poll).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Stopped,
    Starting,
    Running,
    Frozen,
    Stopping,
}

/// The underlying OS container primitive (C4). One instance is shared by
/// every Container the Agent Core owns; each method is scoped by
/// `ContainerId`.
#[async_trait]
pub trait ContainerDriver: Send + Sync + 'static {
    /// Materializes the container definition at `rootfs` so it is ready for
    /// `start`. Does not start any process.
    async fn create(&self, id: &ContainerId, rootfs: &Path) -> Result<(), DriverError>;

    /// Starts the container's init process (blocks indefinitely so
    /// subsequent attaches control the container's lifetime) and returns
    /// its host-namespace PID.
    async fn start(&self, id: &ContainerId) -> Result<i32, DriverError>;

    /// Reports the driver's current view of the container's state, used by
    /// `start`'s bounded poll for `Running` (§4.1).
    async fn poll_state(&self, id: &ContainerId) -> Result<DriverState, DriverError>;

    async fn freeze(&self, id: &ContainerId) -> Result<(), DriverError>;
    async fn thaw(&self, id: &ContainerId) -> Result<(), DriverError>;

    /// Requests a clean stop (SIGTERM-equivalent to init). Does not wait;
    /// the caller polls `poll_state` against its own timeout and falls back
    /// to `hard_stop`.
    async fn stop(&self, id: &ContainerId) -> Result<(), DriverError>;

    /// Forcible stop issued when `stop` does not reach `Stopped` within the
    /// caller's timeout (§4.1 `shutdown`).
    async fn hard_stop(&self, id: &ContainerId) -> Result<(), DriverError>;

    /// Tears down the driver-side container object. Best-effort: sc-engine
    /// logs and continues past failures here (§4.1 `destroy`).
    async fn destroy(&self, id: &ContainerId) -> Result<(), DriverError>;

    /// Spawns a process inside the container's namespaces per `job` and
    /// returns its host-namespace PID (§4.1 `execute`).
    async fn attach(&self, id: &ContainerId, job: &JobConfig) -> Result<i32, DriverError>;

    /// Blocks until `pid` exits and returns its exit code. Backs both
    /// `executeSync` and the Agent Core's per-Job exit-event subscription
    /// (§4.10, §9); delivery is guaranteed exactly once per PID.
    async fn wait(&self, pid: i32) -> Result<i32, DriverError>;

    /// Writes one cgroup setting for the container (§4.1
    /// `setCgroupItem`, consumed by the Cgroups gateway).
    async fn set_cgroup_item(
        &self,
        id: &ContainerId,
        subsystem: &str,
        value: &str,
    ) -> Result<(), DriverError>;

    /// Requests the driver expose a host device node inside the container
    /// and returns the in-container path (§4.1 `mountDevice`, paired
    /// with the DeviceNode gateway).
    async fn expose_device(
        &self,
        id: &ContainerId,
        host_dev_path: &Path,
    ) -> Result<PathBuf, DriverError>;

    /// Applies an explicit POSIX mode to an already-exposed device node,
    /// used by the DeviceNode gateway's digit-wise mode union (§4.6).
    async fn chmod_device(
        &self,
        id: &ContainerId,
        in_container_path: &Path,
        mode: u32,
    ) -> Result<(), DriverError>;

    /// The PID of a process already running inside the container's network
    /// namespace (normally the init PID from `start`), used by the Network
    /// gateway and `NetlinkClient` to target in-namespace mutations.
    async fn netns_pid(&self, id: &ContainerId) -> Result<i32, DriverError>;

    /// Terminates the process group led by `pid`, the inverse of `attach`
    /// dispatched by the Cleanup Stack for `CleanupHandler::ProcessTerminate`
    /// (§4.2). Callers that spawn the tracked process as its own group
    /// leader (e.g. the D-Bus gateway's proxy, §4.8) get the whole group
    /// torn down; a PID that has already exited is not an error.
    async fn terminate_pid(&self, pid: i32) -> Result<(), DriverError>;

    /// Writes to a Job's captured stdin pipe (§4.10 `WriteToStdIn`).
    /// Fails with `NoSuchJob` if `pid` was not attached with
    /// `StdioSpec::Piped` stdin or has already exited.
    async fn write_stdin(&self, pid: i32, bytes: &[u8]) -> Result<(), DriverError>;
}
