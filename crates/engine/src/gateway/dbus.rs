// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! D-Bus Gateway (§4.8): spawns an external policy-proxy subprocess
//! per bus type, waits for its Unix socket to appear, and points the
//! container's `DBUS_{SESSION,SYSTEM}_BUS_ADDRESS` at the in-container
//! view of that socket through the shared gateway mount.

use super::{require_nonempty, Gateway};
use crate::container::Container;
use crate::error::EngineError;
use async_trait::async_trait;
use parking_lot::Mutex;
use sc_adapters::subprocess::DBUS_PROXY_READY_TIMEOUT;
use sc_core::{CleanupHandler, GatewayActivationError, GatewayConfigError, GatewayKind, GatewayState};
use serde::Deserialize;
use serde_json::Value;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Host-side fact the gateway needs but that no manifest fragment
/// configures: where the policy-proxy binary lives. Supplied by the Agent
/// Core when it builds a Container's `GatewaySet`, the same way
/// `NetworkHostConfig` supplies the bridge name.
#[derive(Debug, Clone)]
pub struct DBusHostConfig {
    pub proxy_path: PathBuf,
}

impl Default for DBusHostConfig {
    fn default() -> Self {
        Self {
            proxy_path: PathBuf::from("/usr/bin/softwarecontainer-dbus-proxy"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DBusFragment {
    #[serde(rename = "dbus-gateway-config-session", default)]
    session: Vec<Value>,
    #[serde(rename = "dbus-gateway-config-system", default)]
    system: Vec<Value>,
}

pub struct DBusGateway {
    state: Mutex<GatewayState>,
    session_rules: Mutex<Vec<Value>>,
    system_rules: Mutex<Vec<Value>>,
    host_config: DBusHostConfig,
    /// Set once a proxy has been spawned for that bus. A proxy is a
    /// subprocess with its own fixed startup config, so rules added to an
    /// already-activated bus cannot be handed to it after the fact; a
    /// repeat `activate` call must not spawn a second proxy (I2).
    session_spawned: Mutex<bool>,
    system_spawned: Mutex<bool>,
}

impl DBusGateway {
    pub fn new() -> Self {
        Self::with_host_config(DBusHostConfig::default())
    }

    pub fn with_host_config(host_config: DBusHostConfig) -> Self {
        Self {
            state: Mutex::new(GatewayState::Created),
            session_rules: Mutex::new(Vec::new()),
            system_rules: Mutex::new(Vec::new()),
            host_config,
            session_spawned: Mutex::new(false),
            system_spawned: Mutex::new(false),
        }
    }

    /// Spawns the proxy for one bus type, waits for its socket to appear,
    /// registers the cleanup handlers that terminate it and unlink the
    /// socket, and points `env_var` at the in-container address.
    async fn activate_bus(
        &self,
        container: &Container,
        bus: &'static str,
        rules: &[Value],
        env_var: &'static str,
    ) -> Result<(), EngineError> {
        let socket_name = format!("dbus-{bus}.sock");
        let socket_host = container.paths().gateway_dir.join(&socket_name);
        let socket_in_container = container.gateway_socket_in_container(&socket_name);

        let mut cmd = Command::new(&self.host_config.proxy_path);
        cmd.arg(&socket_host)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            // Its own process group so teardown can signal the whole group
            // (the proxy may fork helpers), not just this leader PID.
            .process_group(0);

        let mut child = cmd.spawn().map_err(|e| {
            GatewayActivationError::HostResourceUnavailable(format!(
                "failed to spawn {bus} dbus-proxy: {e}"
            ))
        })?;

        let payload = serde_json::to_vec(rules).map_err(|e| {
            GatewayActivationError::HostResourceUnavailable(format!("could not encode {bus} rules: {e}"))
        })?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload).await.map_err(|e| {
                GatewayActivationError::HostResourceUnavailable(format!(
                    "failed to write {bus} dbus-proxy config: {e}"
                ))
            })?;
        }

        let pid = child.id().ok_or_else(|| {
            GatewayActivationError::HostResourceUnavailable(format!("{bus} dbus-proxy exited before reporting a pid"))
        })? as i32;
        // The proxy outlives this function: it is not awaited or killed on
        // drop, only torn down via the cleanup handlers pushed below.
        drop(child);

        self.wait_for_socket(&socket_host).await.map_err(|_| {
            GatewayActivationError::HostResourceUnavailable(format!(
                "{bus} dbus-proxy socket did not appear within {:?}",
                DBUS_PROXY_READY_TIMEOUT
            ))
        })?;

        container
            .cleanup_stack()
            .push(CleanupHandler::ProcessTerminate { pid });
        container
            .cleanup_stack()
            .push(CleanupHandler::FileUnlink { path: socket_host });

        container.set_environment_variable(env_var, &format!("unix:path={}", socket_in_container.display()))?;
        Ok(())
    }

    async fn wait_for_socket(&self, path: &std::path::Path) -> Result<(), ()> {
        let poll_interval = sc_adapters::dbus_socket_poll_ms();
        let attempts = (DBUS_PROXY_READY_TIMEOUT.as_millis() / poll_interval.as_millis()).max(1) as u32;
        for _ in 0..attempts {
            if tokio::fs::metadata(path).await.is_ok() {
                return Ok(());
            }
            tokio::time::sleep(poll_interval).await;
        }
        Err(())
    }
}

impl Default for DBusGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Gateway for DBusGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::DBus
    }

    fn state(&self) -> GatewayState {
        *self.state.lock()
    }

    fn read_config_element(&self, fragment: &Value) -> Result<(), GatewayConfigError> {
        let frag: DBusFragment =
            serde_json::from_value(fragment.clone()).map_err(|e| GatewayConfigError::FieldType {
                field: "dbus".to_string(),
                expected: e.to_string(),
            })?;
        if frag.session.is_empty() && frag.system.is_empty() {
            return Err(GatewayConfigError::FieldMissing(
                "dbus-gateway-config-session or dbus-gateway-config-system".to_string(),
            ));
        }
        self.session_rules.lock().extend(frag.session);
        self.system_rules.lock().extend(frag.system);
        *self.state.lock() = GatewayState::Configured;
        Ok(())
    }

    async fn activate(&self, container: &Container) -> Result<(), EngineError> {
        let session = self.session_rules.lock().clone();
        let system = self.system_rules.lock().clone();
        require_nonempty(session.is_empty() && system.is_empty())?;

        if !session.is_empty() && !*self.session_spawned.lock() {
            self.activate_bus(container, "session", &session, "DBUS_SESSION_BUS_ADDRESS")
                .await?;
            *self.session_spawned.lock() = true;
        }
        if !system.is_empty() && !*self.system_spawned.lock() {
            self.activate_bus(container, "system", &system, "DBUS_SYSTEM_BUS_ADDRESS")
                .await?;
            *self.system_spawned.lock() = true;
        }

        *self.state.lock() = GatewayState::Activated;
        Ok(())
    }

    async fn teardown(&self, _container: &Container) -> Result<(), EngineError> {
        // The proxy process and socket are unwound by the cleanup handlers
        // pushed during `activate`, drained when the Container is
        // destroyed — the same deferred-to-the-stack pattern the other
        // concrete gateways use.
        *self.state.lock() = GatewayState::TornDown;
        Ok(())
    }
}

#[cfg(test)]
#[path = "dbus_tests.rs"]
mod tests;
