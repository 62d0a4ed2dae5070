// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container (C5): the lifecycle state machine (§4.1). Composes the
//! Filesystem Toolkit (C2) and the Container Driver (C4); owns the
//! container's gateway directory and its Cleanup Stack (C1).

use crate::cleanup::CleanupStack;
use crate::error::{self, EngineError};
use parking_lot::Mutex;
use sc_adapters::{fs_toolkit, ContainerDriver};
use sc_core::{ContainerError, ContainerId, ContainerState, JobConfig};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where the shared gateway directory is bind-mounted inside the
/// container's own rootfs. Mount propagation (§4.1's bind-mount-move
/// algorithm) relies on this path existing and being the in-container view
/// of [`ContainerPaths::gateway_dir`].
pub(crate) const GATEWAY_MOUNT_POINT_IN_CONTAINER: &str = "/run/sc-gateway";

/// Filesystem layout for one container under the workspace root (§6
/// "Persistent state layout").
#[derive(Debug, Clone)]
pub struct ContainerPaths {
    pub root: PathBuf,
    pub gateway_dir: PathBuf,
    pub rootfs: PathBuf,
    pub rootfs_upper: PathBuf,
    pub rootfs_lower: PathBuf,
    pub rootfs_work: PathBuf,
    pub env_file: PathBuf,
}

impl ContainerPaths {
    pub fn new(workspace_root: &Path, id: &ContainerId) -> Self {
        let root = workspace_root.join(id.as_str());
        let gateway_dir = root.join("gateways");
        Self {
            rootfs: root.join("rootfs"),
            rootfs_upper: root.join("rootfs-upper"),
            rootfs_lower: root.join("rootfs-lower"),
            rootfs_work: root.join("rootfs-work"),
            env_file: gateway_dir.join("env"),
            gateway_dir,
            root,
        }
    }
}

/// The container lifecycle state machine. One instance per live container,
/// owned exclusively by the Agent Core's container table; gateways hold a
/// non-owning reference for the duration of `activate`/`teardown`.
pub struct Container {
    id: ContainerId,
    paths: ContainerPaths,
    write_buffer: bool,
    shutdown_timeout: Duration,
    state: Mutex<ContainerState>,
    env: Mutex<HashMap<String, String>>,
    driver: Arc<dyn ContainerDriver>,
    cleanup: CleanupStack,
    init_pid: Mutex<Option<i32>>,
}

impl Container {
    pub fn new(
        id: ContainerId,
        workspace_root: &Path,
        write_buffer: bool,
        shutdown_timeout: Duration,
        driver: Arc<dyn ContainerDriver>,
    ) -> Self {
        Self {
            paths: ContainerPaths::new(workspace_root, &id),
            id,
            write_buffer,
            shutdown_timeout,
            state: Mutex::new(ContainerState::Default),
            env: Mutex::new(HashMap::new()),
            driver,
            cleanup: CleanupStack::new(),
            init_pid: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &ContainerId {
        &self.id
    }

    pub fn paths(&self) -> &ContainerPaths {
        &self.paths
    }

    pub fn state(&self) -> ContainerState {
        *self.state.lock()
    }

    pub fn cleanup_stack(&self) -> &CleanupStack {
        &self.cleanup
    }

    /// The environment map accumulated by gateways and `setEnvironmentVariable`
    /// (§3's Container attributes).
    pub fn environment(&self) -> HashMap<String, String> {
        self.env.lock().clone()
    }

    fn require_state(&self, expected: ContainerState, stage: &'static str) -> Result<(), EngineError> {
        let actual = self.state();
        if actual == expected {
            Ok(())
        } else {
            Err(ContainerError::StateMismatch {
                expected: expected.name(),
                actual: actual.name(),
            }
            .into())
        }
    }

    /// Default -> Prepared. Creates the gateway directory as a shared mount
    /// point so mount propagation from the host reaches the container
    /// (§4.1, §9). Idempotent from Prepared onward.
    pub async fn initialize(&self) -> Result<(), EngineError> {
        if self.state().is_prepared_or_later() {
            return Ok(());
        }

        let mark = self.cleanup.mark();
        match self.do_initialize().await {
            Ok(()) => {
                *self.state.lock() = ContainerState::Prepared;
                Ok(())
            }
            Err(e) => {
                self.cleanup.rollback_to(mark, &self.driver).await;
                Err(e)
            }
        }
    }

    async fn do_initialize(&self) -> Result<(), EngineError> {
        let handler = fs_toolkit::create_dir_recursive(&self.paths.gateway_dir)
            .map_err(|e| error::mount_failed(self.paths.gateway_dir.display().to_string(), e))?;
        self.cleanup.push(handler);

        let handler = fs_toolkit::tmpfs_mount(&self.paths.gateway_dir)
            .map_err(|e| error::mount_failed(self.paths.gateway_dir.display().to_string(), e))?;
        self.cleanup.push(handler);

        fs_toolkit::make_shared(&self.paths.gateway_dir)
            .map_err(|e| error::mount_failed(self.paths.gateway_dir.display().to_string(), e))?;
        Ok(())
    }

    /// Prepared -> Created. Mounts the write-buffer overlay if enabled, then
    /// invokes the driver's create. Any failure unwinds only the handlers
    /// pushed by this call.
    pub async fn create(&self) -> Result<(), EngineError> {
        self.require_state(ContainerState::Prepared, "create")?;

        let mark = self.cleanup.mark();
        match self.do_create().await {
            Ok(()) => {
                *self.state.lock() = ContainerState::Created;
                Ok(())
            }
            Err(e) => {
                self.cleanup.rollback_to(mark, &self.driver).await;
                Err(e)
            }
        }
    }

    async fn do_create(&self) -> Result<(), EngineError> {
        if self.write_buffer {
            let handler = fs_toolkit::overlay_mount(
                &self.paths.rootfs_lower,
                &self.paths.rootfs_upper,
                &self.paths.rootfs_work,
                &self.paths.rootfs,
            )
            .map_err(|e| error::mount_failed(self.paths.rootfs.display().to_string(), e))?;
            self.cleanup.push(handler);
        }

        self.driver
            .create(&self.id, &self.paths.rootfs)
            .await
            .map_err(|e| error::driver_failed("create", e))
    }

    /// Created -> Started. Starts the init process and polls the driver
    /// until it reports `Running` or a bounded timeout expires.
    pub async fn start(&self) -> Result<i32, EngineError> {
        self.require_state(ContainerState::Created, "start")?;

        let pid = self
            .driver
            .start(&self.id)
            .await
            .map_err(|e| error::driver_failed("start", e))?;

        self.wait_for_running().await?;

        *self.init_pid.lock() = Some(pid);
        *self.state.lock() = ContainerState::Started;
        Ok(pid)
    }

    async fn wait_for_running(&self) -> Result<(), EngineError> {
        use sc_adapters::DriverState;

        const MAX_ATTEMPTS: u32 = 50;
        let poll_interval = sc_adapters::driver_state_poll_ms();

        for _ in 0..MAX_ATTEMPTS {
            match self.driver.poll_state(&self.id).await {
                Ok(DriverState::Running) => return Ok(()),
                Ok(_) => tokio::time::sleep(poll_interval).await,
                Err(e) => return Err(error::driver_failed("start.poll", e)),
            }
        }
        Err(ContainerError::Timeout { stage: "start" }.into())
    }

    /// Started -> Frozen.
    pub async fn suspend(&self) -> Result<(), EngineError> {
        self.require_state(ContainerState::Started, "suspend")?;
        self.driver
            .freeze(&self.id)
            .await
            .map_err(|e| error::driver_failed("suspend", e))?;
        *self.state.lock() = ContainerState::Frozen;
        Ok(())
    }

    /// Frozen -> Started.
    pub async fn resume(&self) -> Result<(), EngineError> {
        self.require_state(ContainerState::Frozen, "resume")?;
        self.driver
            .thaw(&self.id)
            .await
            .map_err(|e| error::driver_failed("resume", e))?;
        *self.state.lock() = ContainerState::Started;
        Ok(())
    }

    /// Started -> Created. Requests a clean stop; if the driver has not
    /// reported `Stopped` within `timeout`, issues a hard stop.
    pub async fn shutdown(&self, timeout: Option<Duration>) -> Result<(), EngineError> {
        if self.state() != ContainerState::Started {
            return Ok(());
        }
        let timeout = timeout.unwrap_or(self.shutdown_timeout);

        self.driver
            .stop(&self.id)
            .await
            .map_err(|e| error::driver_failed("shutdown", e))?;

        if tokio::time::timeout(timeout, self.poll_stopped()).await.is_err() {
            warn!(id = %self.id, "shutdown timed out, issuing hard stop");
            self.driver
                .hard_stop(&self.id)
                .await
                .map_err(|e| error::driver_failed("shutdown.hard_stop", e))?;
        }

        *self.state.lock() = ContainerState::Created;
        Ok(())
    }

    async fn poll_stopped(&self) {
        use sc_adapters::DriverState;
        loop {
            if matches!(self.driver.poll_state(&self.id).await, Ok(DriverState::Stopped) | Err(_)) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Any state ≥ Created -> Destroyed. Best-effort idempotent: per-step
    /// failures are logged and do not stop the sequence; the final state is
    /// always Destroyed.
    pub async fn destroy(&self, timeout: Option<Duration>) -> Result<(), EngineError> {
        if self.state() == ContainerState::Started || self.state() == ContainerState::Frozen {
            if self.state() == ContainerState::Frozen {
                if let Err(e) = self.resume().await {
                    warn!(id = %self.id, error = %e, "destroy: resume before shutdown failed");
                }
            }
            if let Err(e) = self.shutdown(timeout).await {
                warn!(id = %self.id, error = %e, "destroy: shutdown failed, continuing");
            }
        }

        if self.write_buffer {
            if let Err(e) = fs_toolkit::sync_overlay(&self.paths.rootfs_upper) {
                warn!(id = %self.id, error = %e, "destroy: overlay sync failed, continuing");
            }
        }

        let failed = self.cleanup.drain(&self.driver).await;
        if !failed.is_empty() {
            warn!(id = %self.id, count = failed.len(), "destroy: cleanup incomplete");
        }

        if let Err(e) = self.driver.destroy(&self.id).await {
            warn!(id = %self.id, error = %e, "destroy: driver destroy failed, continuing");
        }

        *self.state.lock() = ContainerState::Destroyed;
        info!(id = %self.id, "container destroyed");
        Ok(())
    }

    fn merged_env(&self, per_call: &HashMap<String, String>) -> HashMap<String, String> {
        let mut merged = self.env.lock().clone();
        for (k, v) in per_call {
            if merged.contains_key(k) {
                debug!(name = %k, "per-call environment overrides gateway value");
            }
            merged.insert(k.clone(), v.clone());
        }
        merged
    }

    /// Spawns a process inside the container and returns its host-namespace
    /// PID. Requires `Started`. Per-call `job.env` wins over the gateway
    /// environment (§4.1, P2).
    pub async fn execute(&self, mut job: JobConfig) -> Result<i32, EngineError> {
        self.require_state(ContainerState::Started, "execute")?;
        job.env = self.merged_env(&job.env);
        self.driver
            .attach(&self.id, &job)
            .await
            .map_err(|e| error::driver_failed("execute", e))
    }

    /// Same as `execute`, but waits for termination and succeeds iff the
    /// child exited with status 0.
    pub async fn execute_sync(&self, job: JobConfig) -> Result<bool, EngineError> {
        let pid = self.execute(job).await?;
        let code = self
            .driver
            .wait(pid)
            .await
            .map_err(|e| error::driver_failed("execute_sync.wait", e))?;
        Ok(code == 0)
    }

    /// Blocks until `pid` exits and returns its exit code. The Agent Core's
    /// per-Job exit-event subscription awaits this on a background task
    /// registered when `launch` returns (§4.10, §9).
    pub async fn wait_for_exit(&self, pid: i32) -> Result<i32, EngineError> {
        self.driver
            .wait(pid)
            .await
            .map_err(|e| error::driver_failed("wait_for_exit", e))
    }

    /// Writes `bytes` to a Job's captured stdin pipe (§4.10
    /// `WriteToStdIn`). Fails if `pid` was not attached with a piped stdin
    /// or has already exited.
    pub async fn write_stdin(&self, pid: i32, bytes: &[u8]) -> Result<(), EngineError> {
        self.driver
            .write_stdin(pid, bytes)
            .await
            .map_err(|e| error::driver_failed("write_stdin", e))
    }

    /// Stores `value` into the environment map and appends an `export`
    /// line to the gateway directory's diagnostic file.
    pub fn set_environment_variable(&self, name: &str, value: &str) -> Result<(), EngineError> {
        self.env.lock().insert(name.to_string(), value.to_string());
        let line = format!("export {name}='{value}'\n");
        let handler = fs_toolkit::append_file(&self.paths.env_file, &line)
            .map_err(|e| error::mount_failed(self.paths.env_file.display().to_string(), e))?;
        self.cleanup.push(handler);
        Ok(())
    }

    /// Delegates to the container driver (§4.1 `setCgroupItem`).
    pub async fn set_cgroup_item(&self, subsystem: &str, value: &str) -> Result<(), EngineError> {
        self.driver
            .set_cgroup_item(&self.id, subsystem, value)
            .await
            .map_err(|e| error::driver_failed("set_cgroup_item", e))
    }

    /// Requests the driver expose a host device node inside the container
    /// and returns the in-container path (pairs with the DeviceNode gateway).
    pub async fn mount_device(&self, host_dev_path: &Path) -> Result<PathBuf, EngineError> {
        self.driver
            .expose_device(&self.id, host_dev_path)
            .await
            .map_err(|e| error::driver_failed("mount_device", e))
    }

    /// The in-container path a gateway-directory file named `file_name`
    /// is reachable at, once the container's own mount namespace sees the
    /// shared gateway bind mount (§4.8's D-Bus socket staging uses
    /// this directly, rather than the bind-mount-move `bindMountInContainer`
    /// performs, since the proxy's Unix socket is consumed in place).
    pub fn gateway_socket_in_container(&self, file_name: &str) -> PathBuf {
        PathBuf::from(GATEWAY_MOUNT_POINT_IN_CONTAINER).join(file_name)
    }

    /// The PID of a process running inside the container's network
    /// namespace (the init PID from `start`), used by the Network gateway
    /// to target in-namespace netlink mutations.
    pub async fn netns_pid(&self) -> Result<i32, EngineError> {
        self.driver
            .netns_pid(&self.id)
            .await
            .map_err(|e| error::driver_failed("netns_pid", e))
    }

    /// Applies an explicit POSIX mode to an already-exposed device node
    /// (pairs with the DeviceNode gateway's digit-wise mode union).
    pub async fn chmod_device(&self, in_container_path: &Path, mode: u32) -> Result<(), EngineError> {
        self.driver
            .chmod_device(&self.id, in_container_path, mode)
            .await
            .map_err(|e| error::driver_failed("chmod_device", e))
    }

    /// Binds `host_path` into the container at `container_path`, optionally
    /// read-only. Requires `Started`. Exact steps per §4.1's bind-mount
    /// move algorithm; only the handlers this call pushes (the host-visible
    /// staging directory/file and the staging bind mount) are rolled back
    /// locally on failure, since everything done inside the container's own
    /// mount namespace is torn down automatically with the container.
    pub async fn bind_mount_in_container(
        &self,
        host_path: &Path,
        container_path: &Path,
        read_only: bool,
    ) -> Result<PathBuf, EngineError> {
        self.require_state(ContainerState::Started, "bind_mount_in_container")?;

        let mark = self.cleanup.mark();
        match self
            .do_bind_mount_in_container(host_path, container_path, read_only)
            .await
        {
            Ok(()) => Ok(container_path.to_path_buf()),
            Err(e) => {
                self.cleanup.rollback_to(mark, &self.driver).await;
                Err(e)
            }
        }
    }

    async fn do_bind_mount_in_container(
        &self,
        host_path: &Path,
        container_path: &Path,
        read_only: bool,
    ) -> Result<(), EngineError> {
        let file_name = container_path.file_name().ok_or_else(|| {
            ContainerError::DriverFailed {
                stage: "bind_mount_in_container",
                detail: format!("`{}` has no file name", container_path.display()),
            }
        })?;
        let staging_host = self.paths.gateway_dir.join(file_name);
        let staging_in_container =
            PathBuf::from(GATEWAY_MOUNT_POINT_IN_CONTAINER).join(file_name);

        let host_is_dir = host_path.is_dir();
        let handler = if host_is_dir {
            fs_toolkit::create_dir_recursive(&staging_host)
        } else {
            fs_toolkit::touch_file(&staging_host)
        }
        .map_err(|e| error::mount_failed(staging_host.display().to_string(), e))?;
        self.cleanup.push(handler);

        let handler = fs_toolkit::bind_mount(host_path, &staging_host)
            .map_err(|e| error::mount_failed(staging_host.display().to_string(), e))?;
        self.cleanup.push(handler);

        if let Some(parent) = container_path.parent() {
            self.run_in_container(vec![
                "mkdir".to_string(),
                "-p".to_string(),
                parent.display().to_string(),
            ])
            .await?;
        }

        let create_target = if host_is_dir {
            vec!["mkdir".to_string(), "-p".to_string(), container_path.display().to_string()]
        } else {
            vec!["touch".to_string(), container_path.display().to_string()]
        };
        self.run_in_container(create_target).await?;

        self.run_in_container(vec![
            "mount".to_string(),
            "--move".to_string(),
            staging_in_container.display().to_string(),
            container_path.display().to_string(),
        ])
        .await?;

        if read_only && !self.write_buffer {
            self.run_in_container(vec![
                "mount".to_string(),
                "-o".to_string(),
                "remount,bind,ro".to_string(),
                container_path.display().to_string(),
            ])
            .await?;
        }

        Ok(())
    }

    /// Runs a short-lived command inside the container via the driver's
    /// attach, waiting for it to exit and failing on a non-zero status.
    async fn run_in_container(&self, cmdline: Vec<String>) -> Result<(), EngineError> {
        let job = JobConfig {
            cmdline: cmdline.clone(),
            user: None,
            cwd: None,
            env: HashMap::new(),
            stdin: sc_core::StdioSpec::Null,
            stdout: sc_core::StdioSpec::Null,
            stderr: sc_core::StdioSpec::Null,
        };
        let pid = self
            .driver
            .attach(&self.id, &job)
            .await
            .map_err(|e| error::driver_failed("bind_mount_in_container", e))?;
        let code = self
            .driver
            .wait(pid)
            .await
            .map_err(|e| error::driver_failed("bind_mount_in_container.wait", e))?;
        if code != 0 {
            return Err(ContainerError::DriverFailed {
                stage: "bind_mount_in_container",
                detail: format!("`{}` exited {code}", cmdline.join(" ")),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "container_tests.rs"]
mod tests;
