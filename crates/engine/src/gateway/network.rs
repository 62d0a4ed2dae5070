// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Network Gateway (§4.4): verifies the host bridge, derives a unique
//! per-container IP within its subnet, brings up `eth0` inside the
//! container's network namespace, and emits `iptables` allow-list rules.

use crate::container::Container;
use crate::error::EngineError;
use async_trait::async_trait;
use parking_lot::Mutex;
use sc_adapters::subprocess::{run_with_timeout, NETWORK_COMMAND_TIMEOUT};
use sc_adapters::{IpNet, NetlinkClient};
use sc_core::{
    GatewayActivationError, GatewayConfigError, GatewayKind, GatewayState, NetworkDirection,
    NetworkEntry, ResourceError,
};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::process::Command;

use super::{require_nonempty, Gateway};

/// Host-side network facts the gateway needs but that no capability
/// configures: the bridge it verifies against and where `iptables` lives.
/// Supplied by the Agent Core when it builds a Container's `GatewaySet`.
#[derive(Debug, Clone)]
pub struct NetworkHostConfig {
    pub bridge_name: String,
    pub gateway_ip: Ipv4Addr,
    pub prefix_len: u8,
    pub iptables_path: PathBuf,
}

impl Default for NetworkHostConfig {
    fn default() -> Self {
        Self {
            bridge_name: "sc-br0".to_string(),
            gateway_ip: Ipv4Addr::new(10, 0, 3, 1),
            prefix_len: 24,
            iptables_path: PathBuf::from("/usr/sbin/iptables"),
        }
    }
}

/// Derives the container's IP within the bridge subnet (§4.4 step 2):
/// `(gateway_ip & mask) | ((container_index + 1) & !mask)`. Rejects
/// netmasks shorter than 8 bits (§9's open question) and indices that
/// would overflow the available host-bit range.
pub fn derive_container_ip(
    gateway_ip: Ipv4Addr,
    prefix_len: u8,
    container_index: u32,
) -> Result<Ipv4Addr, ResourceError> {
    if prefix_len < 8 || prefix_len > 30 {
        return Err(ResourceError::IPExhausted);
    }
    let host_bits = 32 - prefix_len as u32;
    let capacity = 1u32 << host_bits;
    let host_part = container_index + 1;
    if host_part >= capacity {
        return Err(ResourceError::IPExhausted);
    }

    let mask: u32 = if prefix_len == 0 { 0 } else { u32::MAX << host_bits };
    let gw: u32 = gateway_ip.into();
    let derived = (gw & mask) | (host_part & !mask);
    if derived == gw {
        return Err(ResourceError::IPExhausted);
    }
    Ok(Ipv4Addr::from(derived))
}

pub struct NetworkGateway {
    state: Mutex<GatewayState>,
    entries: Mutex<Vec<NetworkEntry>>,
    netlink: Arc<dyn NetlinkClient>,
    host_config: NetworkHostConfig,
    container_index: u32,
    /// Count of `entries` whose iptables rules have already been inserted;
    /// a repeat `activate` only emits rules for the entries added since
    /// (I2). `eth0` bring-up is driven separately by `bound`, since it only
    /// happens once regardless of how many entries have been seen.
    applied: Mutex<usize>,
    bound: Mutex<bool>,
}

impl NetworkGateway {
    pub fn new(
        netlink: Arc<dyn NetlinkClient>,
        host_config: NetworkHostConfig,
        container_index: u32,
    ) -> Self {
        Self {
            state: Mutex::new(GatewayState::Created),
            entries: Mutex::new(Vec::new()),
            netlink,
            host_config,
            container_index,
            applied: Mutex::new(0),
            bound: Mutex::new(false),
        }
    }

    /// Verifies the host bridge, derives this container's IP, and brings
    /// `eth0` up inside its network namespace with that address and a
    /// default route. A failure partway through rolls back the netlink
    /// calls already made in this call, in reverse, via the container's own
    /// network namespace (§4.4) — there is no persistent Cleanup Stack
    /// entry for these, since the whole namespace is destroyed with the
    /// container on the ordinary teardown path; this only covers the
    /// window where activation itself fails but the container does not.
    async fn bring_up_interface(&self, container: &Container) -> Result<(), EngineError> {
        let exists = self
            .netlink
            .link_exists(&self.host_config.bridge_name)
            .await
            .map_err(|e| crate::error::netlink_failed("link_exists", e))?;
        if !exists {
            return Err(GatewayActivationError::HostResourceUnavailable(format!(
                "bridge `{}` does not exist",
                self.host_config.bridge_name
            ))
            .into());
        }
        let bridge_addrs = self
            .netlink
            .link_addresses(&self.host_config.bridge_name)
            .await
            .map_err(|e| crate::error::netlink_failed("link_addresses", e))?;
        let expected = IpNet {
            addr: self.host_config.gateway_ip,
            prefix_len: self.host_config.prefix_len,
        };
        if !bridge_addrs.contains(&expected) {
            return Err(GatewayActivationError::HostResourceUnavailable(format!(
                "bridge `{}` does not carry {expected}",
                self.host_config.bridge_name
            ))
            .into());
        }

        let derived_ip = derive_container_ip(
            self.host_config.gateway_ip,
            self.host_config.prefix_len,
            self.container_index,
        )?;
        let derived_net = IpNet {
            addr: derived_ip,
            prefix_len: self.host_config.prefix_len,
        };
        let netns_pid = container.netns_pid().await?;

        if let Err(e) = self.netlink.set_link_up(netns_pid, "eth0").await {
            return Err(crate::error::netlink_failed("set_link_up", e));
        }

        if let Err(e) = self.netlink.add_address(netns_pid, "eth0", derived_net).await {
            let _ = self.netlink.set_link_down(netns_pid, "eth0").await;
            return Err(crate::error::netlink_failed("add_address", e));
        }

        if let Err(e) = self.netlink.add_default_route(netns_pid, self.host_config.gateway_ip).await {
            let _ = self.netlink.del_address(netns_pid, "eth0", derived_net).await;
            let _ = self.netlink.set_link_down(netns_pid, "eth0").await;
            return Err(crate::error::netlink_failed("add_default_route", e));
        }

        Ok(())
    }

    async fn run_iptables(&self, args: &[String]) -> Result<(), EngineError> {
        let mut cmd = Command::new(&self.host_config.iptables_path);
        cmd.args(args);
        match run_with_timeout(cmd, NETWORK_COMMAND_TIMEOUT, "iptables").await {
            Ok(output) if output.status.success() => Ok(()),
            Ok(output) => Err(GatewayActivationError::KernelCallFailed {
                op: "iptables",
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into()),
            Err(detail) => Err(GatewayActivationError::KernelCallFailed { op: "iptables", detail }.into()),
        }
    }

    fn rule_commands(&self, chain: &'static str, entry: &NetworkEntry) -> Vec<Vec<String>> {
        let mut commands = Vec::new();
        for rule in &entry.allow {
            let protocols = rule
                .protocols
                .as_ref()
                .map(|p| p.as_vec())
                .unwrap_or_default();
            let protocols: Vec<String> = if protocols.is_empty() {
                vec![String::new()]
            } else {
                protocols.iter().map(|p| p.as_str().to_string()).collect()
            };

            for proto in protocols {
                let mut args = vec!["-A".to_string(), chain.to_string()];
                if rule.host != "*" {
                    match chain {
                        "OUTPUT" => {
                            args.push("-d".to_string());
                            args.push(rule.host.clone());
                        }
                        _ => {
                            args.push("-s".to_string());
                            args.push(rule.host.clone());
                        }
                    }
                }
                if !proto.is_empty() {
                    args.push("-p".to_string());
                    args.push(proto.clone());
                }
                if let Some(ports) = &rule.ports {
                    let port_arg = match ports {
                        sc_core::PortSpec::Single(p) => p.to_string(),
                        sc_core::PortSpec::Range(r) => r.clone(),
                        sc_core::PortSpec::List(list) => {
                            args.push("-m".to_string());
                            args.push("multiport".to_string());
                            list.iter().map(u16::to_string).collect::<Vec<_>>().join(",")
                        }
                    };
                    let dport_flag = match ports {
                        sc_core::PortSpec::List(_) => "--dports",
                        _ => "--dport",
                    };
                    args.push(dport_flag.to_string());
                    args.push(port_arg);
                }
                args.push("-j".to_string());
                args.push("ACCEPT".to_string());
                commands.push(args);
            }
        }
        commands
    }
}

#[async_trait]
impl Gateway for NetworkGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Network
    }

    fn state(&self) -> GatewayState {
        *self.state.lock()
    }

    fn read_config_element(&self, fragment: &serde_json::Value) -> Result<(), GatewayConfigError> {
        let entry: NetworkEntry =
            serde_json::from_value(fragment.clone()).map_err(|e| GatewayConfigError::FieldType {
                field: "network".to_string(),
                expected: e.to_string(),
            })?;
        self.entries.lock().push(entry);
        *self.state.lock() = GatewayState::Configured;
        Ok(())
    }

    async fn activate(&self, container: &Container) -> Result<(), EngineError> {
        let entries = self.entries.lock().clone();
        require_nonempty(entries.is_empty())?;
        let start = *self.applied.lock();

        if !*self.bound.lock() {
            self.bring_up_interface(container).await?;
            *self.bound.lock() = true;
        }

        for entry in &entries[start..] {
            let chain = entry.direction.chain();
            for args in self.rule_commands(chain, entry) {
                self.run_iptables(&args).await?;
            }
            self.run_iptables(&["-P".to_string(), chain.to_string(), "DROP".to_string()])
                .await?;
        }
        *self.applied.lock() = entries.len();

        *self.state.lock() = GatewayState::Activated;
        Ok(())
    }

    async fn teardown(&self, _container: &Container) -> Result<(), EngineError> {
        // Rules are not retracted individually (§4.4): the
        // container's network namespace, and every address/route inside
        // it, is destroyed with the container.
        *self.state.lock() = GatewayState::TornDown;
        Ok(())
    }
}

#[cfg(test)]
#[path = "network_tests.rs"]
mod tests;
