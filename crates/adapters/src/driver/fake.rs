// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory `ContainerDriver` for tests, including the six scenarios of
//! §8 run against the workspace's `tests/specs.rs` (which need no
//! privileged kernel access or root).
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ContainerDriver, DriverError, DriverState};
use async_trait::async_trait;
use parking_lot::Mutex;
use sc_core::{ContainerId, JobConfig, StdioSpec};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

/// Recorded driver call, for assertions in tests that exercise sc-engine
/// against the fake.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Create { id: String },
    Start { id: String },
    Freeze { id: String },
    Thaw { id: String },
    Stop { id: String },
    HardStop { id: String },
    Destroy { id: String },
    Attach { id: String, cmdline: Vec<String> },
    SetCgroupItem { id: String, subsystem: String, value: String },
    ExposeDevice { id: String, host_dev_path: PathBuf },
    ChmodDevice { id: String, path: PathBuf, mode: u32 },
    TerminatePid { pid: i32 },
}

#[derive(Debug, Clone, Default)]
struct FakeContainer {
    state: Option<DriverState>,
    init_pid: Option<i32>,
    cgroups: HashMap<String, String>,
    devices: HashMap<PathBuf, u32>,
}

struct Inner {
    containers: HashMap<String, FakeContainer>,
    calls: Vec<DriverCall>,
    fail_stage: HashMap<&'static str, String>,
    job_exit_codes: HashMap<i32, i32>,
    next_pid: AtomicI32,
    /// PIDs attached with `StdioSpec::Piped` stdin, and the bytes written to
    /// each so far via `write_stdin`.
    piped_stdins: HashMap<i32, Vec<u8>>,
}

/// Fake container driver backed by an in-process map; no real mounts,
/// namespaces, or subprocesses are touched.
#[derive(Clone)]
pub struct FakeContainerDriver {
    inner: Arc<Mutex<Inner>>,
}

impl Default for FakeContainerDriver {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                containers: HashMap::new(),
                calls: Vec::new(),
                fail_stage: HashMap::new(),
                job_exit_codes: HashMap::new(),
                next_pid: AtomicI32::new(1000),
                piped_stdins: HashMap::new(),
            })),
        }
    }
}

impl FakeContainerDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.inner.lock().calls.clone()
    }

    /// Makes the named stage fail on its next invocation, for rollback
    /// tests (property P1).
    pub fn fail_next(&self, stage: &'static str, detail: impl Into<String>) {
        self.inner.lock().fail_stage.insert(stage, detail.into());
    }

    /// Pre-sets the exit code `wait` returns for a PID produced by `attach`.
    pub fn set_exit_code(&self, pid: i32, code: i32) {
        self.inner.lock().job_exit_codes.insert(pid, code);
    }

    pub fn cgroup_value(&self, id: &str, subsystem: &str) -> Option<String> {
        self.inner
            .lock()
            .containers
            .get(id)
            .and_then(|c| c.cgroups.get(subsystem).cloned())
    }

    pub fn device_mode(&self, id: &str, in_container_path: &Path) -> Option<u32> {
        self.inner
            .lock()
            .containers
            .get(id)
            .and_then(|c| c.devices.get(in_container_path).copied())
    }

    /// The bytes written so far to `pid`'s stdin via `write_stdin`, for
    /// tests asserting on `WriteToStdIn` delivery. `None` if `pid` was never
    /// attached with a piped stdin.
    pub fn stdin_written(&self, pid: i32) -> Option<Vec<u8>> {
        self.inner.lock().piped_stdins.get(&pid).cloned()
    }

    fn maybe_fail(&self, stage: &'static str) -> Result<(), DriverError> {
        let mut inner = self.inner.lock();
        if let Some(detail) = inner.fail_stage.remove(stage) {
            return Err(DriverError::CommandFailed { stage, detail });
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerDriver for FakeContainerDriver {
    async fn create(&self, id: &ContainerId, _rootfs: &Path) -> Result<(), DriverError> {
        self.maybe_fail("create")?;
        let mut inner = self.inner.lock();
        inner.calls.push(DriverCall::Create { id: id.as_str().to_string() });
        inner
            .containers
            .entry(id.as_str().to_string())
            .or_default()
            .state = Some(DriverState::Stopped);
        Ok(())
    }

    async fn start(&self, id: &ContainerId) -> Result<i32, DriverError> {
        self.maybe_fail("start")?;
        let pid = self.inner.lock().next_pid.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock();
        inner.calls.push(DriverCall::Start { id: id.as_str().to_string() });
        let entry = inner
            .containers
            .entry(id.as_str().to_string())
            .or_default();
        entry.state = Some(DriverState::Running);
        entry.init_pid = Some(pid);
        Ok(pid)
    }

    async fn poll_state(&self, id: &ContainerId) -> Result<DriverState, DriverError> {
        let inner = self.inner.lock();
        inner
            .containers
            .get(id.as_str())
            .and_then(|c| c.state)
            .ok_or_else(|| DriverError::NotFound(id.as_str().to_string()))
    }

    async fn freeze(&self, id: &ContainerId) -> Result<(), DriverError> {
        self.maybe_fail("freeze")?;
        let mut inner = self.inner.lock();
        inner.calls.push(DriverCall::Freeze { id: id.as_str().to_string() });
        if let Some(c) = inner.containers.get_mut(id.as_str()) {
            c.state = Some(DriverState::Frozen);
        }
        Ok(())
    }

    async fn thaw(&self, id: &ContainerId) -> Result<(), DriverError> {
        self.maybe_fail("thaw")?;
        let mut inner = self.inner.lock();
        inner.calls.push(DriverCall::Thaw { id: id.as_str().to_string() });
        if let Some(c) = inner.containers.get_mut(id.as_str()) {
            c.state = Some(DriverState::Running);
        }
        Ok(())
    }

    async fn stop(&self, id: &ContainerId) -> Result<(), DriverError> {
        self.maybe_fail("stop")?;
        let mut inner = self.inner.lock();
        inner.calls.push(DriverCall::Stop { id: id.as_str().to_string() });
        if let Some(c) = inner.containers.get_mut(id.as_str()) {
            c.state = Some(DriverState::Stopped);
        }
        Ok(())
    }

    async fn hard_stop(&self, id: &ContainerId) -> Result<(), DriverError> {
        let mut inner = self.inner.lock();
        inner.calls.push(DriverCall::HardStop { id: id.as_str().to_string() });
        if let Some(c) = inner.containers.get_mut(id.as_str()) {
            c.state = Some(DriverState::Stopped);
        }
        Ok(())
    }

    async fn destroy(&self, id: &ContainerId) -> Result<(), DriverError> {
        let mut inner = self.inner.lock();
        inner.calls.push(DriverCall::Destroy { id: id.as_str().to_string() });
        inner.containers.remove(id.as_str());
        Ok(())
    }

    async fn attach(&self, id: &ContainerId, job: &JobConfig) -> Result<i32, DriverError> {
        self.maybe_fail("attach")?;
        let pid = self.inner.lock().next_pid.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock();
        inner.calls.push(DriverCall::Attach {
            id: id.as_str().to_string(),
            cmdline: job.cmdline.clone(),
        });
        if matches!(job.stdin, StdioSpec::Piped) {
            inner.piped_stdins.insert(pid, Vec::new());
        }
        Ok(pid)
    }

    async fn wait(&self, pid: i32) -> Result<i32, DriverError> {
        Ok(self
            .inner
            .lock()
            .job_exit_codes
            .get(&pid)
            .copied()
            .unwrap_or(0))
    }

    async fn set_cgroup_item(
        &self,
        id: &ContainerId,
        subsystem: &str,
        value: &str,
    ) -> Result<(), DriverError> {
        self.maybe_fail("set_cgroup_item")?;
        let mut inner = self.inner.lock();
        inner.calls.push(DriverCall::SetCgroupItem {
            id: id.as_str().to_string(),
            subsystem: subsystem.to_string(),
            value: value.to_string(),
        });
        inner
            .containers
            .entry(id.as_str().to_string())
            .or_default()
            .cgroups
            .insert(subsystem.to_string(), value.to_string());
        Ok(())
    }

    async fn expose_device(
        &self,
        id: &ContainerId,
        host_dev_path: &Path,
    ) -> Result<PathBuf, DriverError> {
        self.maybe_fail("expose_device")?;
        let in_container =
            PathBuf::from("/dev").join(host_dev_path.file_name().unwrap_or_default());
        let mut inner = self.inner.lock();
        inner.calls.push(DriverCall::ExposeDevice {
            id: id.as_str().to_string(),
            host_dev_path: host_dev_path.to_path_buf(),
        });
        inner
            .containers
            .entry(id.as_str().to_string())
            .or_default();
        Ok(in_container)
    }

    async fn chmod_device(
        &self,
        id: &ContainerId,
        in_container_path: &Path,
        mode: u32,
    ) -> Result<(), DriverError> {
        self.maybe_fail("chmod_device")?;
        let mut inner = self.inner.lock();
        inner.calls.push(DriverCall::ChmodDevice {
            id: id.as_str().to_string(),
            path: in_container_path.to_path_buf(),
            mode,
        });
        inner
            .containers
            .entry(id.as_str().to_string())
            .or_default()
            .devices
            .insert(in_container_path.to_path_buf(), mode);
        Ok(())
    }

    async fn netns_pid(&self, id: &ContainerId) -> Result<i32, DriverError> {
        self.inner
            .lock()
            .containers
            .get(id.as_str())
            .and_then(|c| c.init_pid)
            .ok_or_else(|| DriverError::NotFound(id.as_str().to_string()))
    }

    async fn terminate_pid(&self, pid: i32) -> Result<(), DriverError> {
        self.inner.lock().calls.push(DriverCall::TerminatePid { pid });
        Ok(())
    }

    async fn write_stdin(&self, pid: i32, bytes: &[u8]) -> Result<(), DriverError> {
        let mut inner = self.inner.lock();
        let buf = inner.piped_stdins.get_mut(&pid).ok_or(DriverError::NoSuchJob(pid))?;
        buf.extend_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
