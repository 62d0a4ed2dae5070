// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent Core (C9, §4.10): the process-wide object that owns every
//! live container, dispatches each RPC operation of §6 onto the
//! engine crate's `Container`/`GatewaySet`/`ManifestStore`, and maintains
//! the preload pool, the job table, and the `ProcessStateChanged` signal.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use sc_adapters::{ContainerDriver, NetlinkClient};
use sc_core::{
    CapabilityName, ContainerError, ContainerHandle, ContainerId, GatewayActivationError,
    GatewayConfigError, IdGen, JobConfig, ManifestError, ResourceError, StdioSpec, UuidIdGen,
};
use sc_engine::gateway::network::NetworkHostConfig;
use sc_engine::{Container, EngineError, GatewaySet, ManifestStore};

use crate::event_bus::{EventBus, ProcessStateChanged};

/// Everything the Agent Core needs that isn't discovered from a manifest:
/// the CLI flags of §6 plus the host-side network facts gateways need.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub workspace_root: PathBuf,
    pub preload_count: usize,
    pub default_user: u32,
    pub shutdown_timeout: Duration,
    pub write_buffer: bool,
    pub network_host_config: NetworkHostConfig,
}

/// Errors surfaced across the RPC boundary (§7). `kind()` gives the
/// short machine-readable name `Response::Error::error_kind` carries.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("no container with handle {0}")]
    UnknownHandle(u32),

    #[error("no live job with pid {0}")]
    UnknownJob(i32),

    #[error("job {0} was not started with a captured stdin pipe")]
    NoStdinPipe(i32),

    #[error("gateway config fragment for `{gateway_id}` is not valid JSON: {detail}")]
    InvalidFragment { gateway_id: String, detail: String },

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl AgentError {
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::UnknownHandle(_) => "unknown_handle",
            AgentError::UnknownJob(_) => "unknown_job",
            AgentError::NoStdinPipe(_) => "no_stdin_pipe",
            AgentError::InvalidFragment { .. } => "invalid_fragment",
            AgentError::Manifest(e) => manifest_kind(e),
            AgentError::Engine(e) => engine_kind(e),
        }
    }
}

fn manifest_kind(e: &ManifestError) -> &'static str {
    match e {
        ManifestError::PathInvalid(_) => "manifest_path_invalid",
        ManifestError::ParseFailure(_) => "manifest_parse_failure",
        ManifestError::SchemaViolation { .. } => "manifest_schema_violation",
        ManifestError::DuplicateDestructive(_) => "manifest_duplicate_destructive",
    }
}

fn engine_kind(e: &EngineError) -> &'static str {
    match e {
        EngineError::Container(c) => match c {
            ContainerError::DriverFailed { .. } => "driver_failed",
            ContainerError::StateMismatch { .. } => "state_mismatch",
            ContainerError::Timeout { .. } => "timeout",
        },
        EngineError::GatewayConfig(g) => match g {
            GatewayConfigError::Empty => "gateway_config_empty",
            GatewayConfigError::FieldMissing(_) => "gateway_config_field_missing",
            GatewayConfigError::FieldType { .. } => "gateway_config_field_type",
            GatewayConfigError::ValueOutOfRange { .. } => "gateway_config_value_out_of_range",
            GatewayConfigError::ConflictWithExisting { .. } => "gateway_config_conflict",
        },
        EngineError::GatewayActivation(a) => match a {
            GatewayActivationError::Precondition(_) => "gateway_activation_precondition",
            GatewayActivationError::HostResourceUnavailable(_) => {
                "gateway_activation_host_resource_unavailable"
            }
            GatewayActivationError::KernelCallFailed { .. } => "gateway_activation_kernel_call_failed",
        },
        EngineError::Resource(r) => match r {
            ResourceError::IPExhausted => "ip_exhausted",
            ResourceError::MountFailed(_) => "mount_failed",
            ResourceError::CleanupIncomplete(_) => "cleanup_incomplete",
        },
        EngineError::Manifest(e) => manifest_kind(e),
    }
}

/// A live container together with the gateway set configuring it. Held
/// behind an `Arc` so a caller can look it up, drop the table lock, and
/// keep using it across an `.await`.
struct ContainerEntry {
    container: Arc<Container>,
    gateways: GatewaySet,
}

/// One outstanding job, enough to route `WriteToStdIn` and to know which
/// container a PID's exit belongs to.
struct JobEntry {
    handle: ContainerHandle,
    has_stdin_pipe: bool,
}

/// Process-wide state: the container table indexed by numeric handle, the
/// preload pool, the job table, and the signal bus. One instance per
/// `scd` process.
pub struct AgentCore {
    config: AgentConfig,
    driver: Arc<dyn ContainerDriver>,
    netlink: Arc<dyn NetlinkClient>,
    id_gen: Arc<dyn IdGen>,
    manifests: ManifestStore,
    event_bus: EventBus,

    containers: Mutex<Vec<Option<Arc<ContainerEntry>>>>,
    id_to_handle: Mutex<HashMap<ContainerId, ContainerHandle>>,
    preloaded: Mutex<VecDeque<Arc<ContainerEntry>>>,
    jobs: Mutex<HashMap<i32, JobEntry>>,
    creation_order: Mutex<Vec<ContainerHandle>>,
    next_container_index: AtomicU32,
    self_ref: Mutex<Weak<AgentCore>>,
}

impl AgentCore {
    /// Builds an Agent Core wrapped in the `Arc` every caller needs
    /// (the listener holds one, and background tasks spawned for preload
    /// refill and exit-watching need to outlive the call that started them).
    pub fn new(
        config: AgentConfig,
        driver: Arc<dyn ContainerDriver>,
        netlink: Arc<dyn NetlinkClient>,
        manifests: ManifestStore,
    ) -> Arc<Self> {
        let agent = Arc::new(Self {
            config,
            driver,
            netlink,
            id_gen: Arc::new(UuidIdGen),
            manifests,
            event_bus: EventBus::new(),
            containers: Mutex::new(Vec::new()),
            id_to_handle: Mutex::new(HashMap::new()),
            preloaded: Mutex::new(VecDeque::new()),
            jobs: Mutex::new(HashMap::new()),
            creation_order: Mutex::new(Vec::new()),
            next_container_index: AtomicU32::new(0),
            self_ref: Mutex::new(Weak::new()),
        });
        *agent.self_ref.lock() = Arc::downgrade(&agent);
        agent
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ProcessStateChanged> {
        self.event_bus.subscribe()
    }

    #[cfg(test)]
    pub(crate) fn preload_len(&self) -> usize {
        self.preloaded.lock().len()
    }

    /// `CreateContainer` (§6): takes a container from the preload pool
    /// if one is ready, otherwise builds one inline. Either way, by the
    /// time this returns the container has run `initialize`/`create` and
    /// is sitting in `Created`, ready for `SetCapabilities`/`LaunchCommand`.
    pub async fn create_container(&self, prefix: &str) -> Result<ContainerHandle, AgentError> {
        let popped = self.preloaded.lock().pop_front();
        let entry = match popped {
            Some(entry) => entry,
            None => self.build_container_entry(prefix).await?,
        };
        let handle = self.insert_container(entry);
        self.spawn_preload_refill();
        info!(handle = handle.0, "container created");
        Ok(handle)
    }

    fn insert_container(&self, entry: Arc<ContainerEntry>) -> ContainerHandle {
        let id = entry.container.id().clone();
        let mut containers = self.containers.lock();
        let index = containers.len() as u32;
        containers.push(Some(entry));
        let handle = ContainerHandle(index);
        self.id_to_handle.lock().insert(id, handle);
        self.creation_order.lock().push(handle);
        handle
    }

    async fn build_container_entry(&self, prefix: &str) -> Result<Arc<ContainerEntry>, AgentError> {
        let id = ContainerId::new(format!("{prefix}-{}", self.id_gen.next()));
        let index = self.next_container_index.fetch_add(1, Ordering::SeqCst);
        let gateways =
            GatewaySet::new(Arc::clone(&self.netlink), self.config.network_host_config.clone(), index);
        let container = Container::new(
            id,
            &self.config.workspace_root,
            self.config.write_buffer,
            self.config.shutdown_timeout,
            Arc::clone(&self.driver),
        );
        container.initialize().await?;
        container.create().await?;
        Ok(Arc::new(ContainerEntry {
            container: Arc::new(container),
            gateways,
        }))
    }

    /// Tops the preload pool back up to `preload_count` in the background,
    /// so `CreateContainer` calls arriving while refill is in flight still
    /// get whatever is already sitting in the pool instead of blocking on it.
    fn spawn_preload_refill(&self) {
        let target = self.config.preload_count;
        if target == 0 {
            return;
        }
        let Some(this) = self.self_ref.lock().upgrade() else {
            return;
        };
        tokio::spawn(async move {
            loop {
                if this.preloaded.lock().len() >= target {
                    break;
                }
                match this.build_container_entry("preload").await {
                    Ok(entry) => this.preloaded.lock().push_back(entry),
                    Err(e) => {
                        warn!(error = %e, "preload refill failed, giving up for now");
                        break;
                    }
                }
            }
        });
    }

    fn get_entry(&self, handle: ContainerHandle) -> Result<Arc<ContainerEntry>, AgentError> {
        self.containers
            .lock()
            .get(handle.0 as usize)
            .and_then(Option::clone)
            .ok_or(AgentError::UnknownHandle(handle.0))
    }

    /// `SetCapabilities` (§6): resolves capability names through the
    /// Manifest Store and feeds the resulting per-gateway fragments through
    /// the same path `SetGatewayConfigs` uses.
    pub async fn set_capabilities(
        &self,
        handle: ContainerHandle,
        ids: &[CapabilityName],
    ) -> Result<(), AgentError> {
        let config = self.manifests.configs_for(ids);
        let entry = self.get_entry(handle)?;
        for (gateway_id, fragments) in &config.0 {
            for fragment in fragments {
                entry.gateways.read_config_element(gateway_id, fragment)?;
            }
        }
        entry.gateways.activate_all(&entry.container).await?;
        Ok(())
    }

    /// `SetGatewayConfigs` (§6): the raw-fragment shortcut, bypassing
    /// the Manifest Store entirely. Each value is either a single JSON
    /// fragment or a JSON array of fragments for that gateway.
    pub async fn set_gateway_configs(
        &self,
        handle: ContainerHandle,
        configs: &HashMap<String, String>,
    ) -> Result<(), AgentError> {
        let entry = self.get_entry(handle)?;
        for (gateway_id, raw) in configs {
            let value: Value = serde_json::from_str(raw).map_err(|e| AgentError::InvalidFragment {
                gateway_id: gateway_id.clone(),
                detail: e.to_string(),
            })?;
            let fragments: Vec<Value> = match value {
                Value::Array(items) => items,
                other => vec![other],
            };
            for fragment in &fragments {
                entry.gateways.read_config_element(gateway_id, fragment)?;
            }
        }
        entry.gateways.activate_all(&entry.container).await?;
        Ok(())
    }

    /// `LaunchCommand` (§6). Every job opens stdin as `Piped`
    /// regardless of whether the caller ever calls `WriteToStdIn`, so that
    /// RPC stays usable on any PID this call returns. `stdout`/`stderr` go
    /// to `out_file` if given, otherwise inherit the daemon's own.
    pub async fn launch(
        &self,
        handle: ContainerHandle,
        cmdline: Vec<String>,
        user: Option<u32>,
        cwd: Option<PathBuf>,
        out_file: Option<PathBuf>,
        env: HashMap<String, String>,
    ) -> Result<i32, AgentError> {
        let entry = self.get_entry(handle)?;
        let user = user.or(Some(self.config.default_user));
        let (stdout, stderr) = match out_file {
            Some(path) => (StdioSpec::RedirectToFile(path.clone()), StdioSpec::RedirectToFile(path)),
            None => (StdioSpec::Inherit, StdioSpec::Inherit),
        };
        let job = JobConfig {
            cmdline,
            user,
            cwd,
            env,
            stdin: StdioSpec::Piped,
            stdout,
            stderr,
        };
        let pid = entry.container.execute(job).await?;
        self.jobs.lock().insert(
            pid,
            JobEntry {
                handle,
                has_stdin_pipe: true,
            },
        );
        self.spawn_exit_watcher(handle, entry, pid);
        Ok(pid)
    }

    /// Waits for `pid` to exit and fires exactly one `ProcessStateChanged`
    /// (property P8). Runs detached from the `launch` call that started it, so
    /// the caller gets its PID back without waiting for the process to run.
    fn spawn_exit_watcher(&self, handle: ContainerHandle, entry: Arc<ContainerEntry>, pid: i32) {
        let Some(this) = self.self_ref.lock().upgrade() else {
            return;
        };
        tokio::spawn(async move {
            let exit_code = match entry.container.wait_for_exit(pid).await {
                Ok(code) => code,
                Err(e) => {
                    warn!(pid, error = %e, "wait_for_exit failed, reporting exit code -1");
                    -1
                }
            };
            this.jobs.lock().remove(&pid);
            this.event_bus.send(ProcessStateChanged {
                handle,
                pid,
                is_running: false,
                exit_code,
            });
        });
    }

    /// `WriteToStdIn` (§6). PIDs are looked up directly in the job
    /// table rather than through a handle, since the caller only has the
    /// PID `LaunchCommand` returned.
    pub async fn write_stdin(&self, pid: i32, bytes: &[u8]) -> Result<(), AgentError> {
        let handle = {
            let jobs = self.jobs.lock();
            let job = jobs.get(&pid).ok_or(AgentError::UnknownJob(pid))?;
            if !job.has_stdin_pipe {
                return Err(AgentError::NoStdinPipe(pid));
            }
            job.handle
        };
        let entry = self.get_entry(handle)?;
        entry.container.write_stdin(pid, bytes).await?;
        Ok(())
    }

    /// `ShutDownContainer` (§6). `Container::destroy` is best-effort
    /// and idempotent; once it returns, the handle is retired so a later
    /// call against the same handle gets `UnknownHandle` rather than
    /// operating on a destroyed container.
    pub async fn shutdown_container(
        &self,
        handle: ContainerHandle,
        timeout: Option<Duration>,
    ) -> Result<(), AgentError> {
        let entry = self.get_entry(handle)?;
        entry.gateways.teardown_all(&entry.container).await;
        entry.container.destroy(timeout).await?;
        self.retire(handle);
        Ok(())
    }

    fn retire(&self, handle: ContainerHandle) {
        if let Some(slot) = self.containers.lock().get_mut(handle.0 as usize) {
            *slot = None;
        }
        self.id_to_handle.lock().retain(|_, h| *h != handle);
    }

    /// `BindMountFolderInContainer` (§6, §4.1).
    pub async fn bind_mount_folder_in_container(
        &self,
        handle: ContainerHandle,
        host_path: &Path,
        container_path: &Path,
        read_only: bool,
    ) -> Result<PathBuf, AgentError> {
        let entry = self.get_entry(handle)?;
        let path = entry
            .container
            .bind_mount_in_container(host_path, container_path, read_only)
            .await?;
        Ok(path)
    }

    /// Destroys every live container in the reverse of creation order
    /// (§5: ordered Agent shutdown on SIGINT/SIGTERM), unless the
    /// caller asked to leave containers running for debugging.
    pub async fn shutdown_all(&self, destroy_containers: bool) {
        if !destroy_containers {
            info!("leaving containers running (--shutdown=false)");
            return;
        }
        let order: Vec<ContainerHandle> = self.creation_order.lock().drain(..).collect();
        for handle in order.into_iter().rev() {
            let entry = self
                .containers
                .lock()
                .get_mut(handle.0 as usize)
                .and_then(Option::take);
            if let Some(entry) = entry {
                entry.gateways.teardown_all(&entry.container).await;
                if let Err(e) = entry.container.destroy(Some(self.config.shutdown_timeout)).await {
                    warn!(handle = handle.0, error = %e, "container destroy failed during agent shutdown");
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
