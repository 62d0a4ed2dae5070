// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Real `NetlinkClient`. Host-side bridge queries go straight through
//! `rtnetlink`; the in-container mutations (`eth0` up, address, default
//! route) run inside the target namespace via `nsenter` against
//! `/proc/<pid>/ns/net` rather than an in-process `setns(2)`, keeping this
//! crate free of `unsafe` (the workspace forbids it outright). This is a
//! deliberate simplification over a pure-netlink cross-namespace client;
//! see `DESIGN.md`.

use super::{IpNet, NetlinkClient, NetlinkError};
use crate::subprocess::{run_with_timeout, NETWORK_COMMAND_TIMEOUT};
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use std::net::Ipv4Addr;
use tokio::process::Command;

#[derive(Debug, Clone, Default)]
pub struct RtNetlinkClient;

impl RtNetlinkClient {
    pub fn new() -> Self {
        Self
    }

    async fn run_in_netns(
        &self,
        op: &'static str,
        netns_pid: i32,
        args: &[&str],
    ) -> Result<(), NetlinkError> {
        let mut cmd = Command::new("nsenter");
        cmd.arg("--net").arg(format!("/proc/{netns_pid}/ns/net")).arg("--").args(args);
        let output = run_with_timeout(cmd, NETWORK_COMMAND_TIMEOUT, op)
            .await
            .map_err(|detail| NetlinkError::OperationFailed { op, detail })?;
        if !output.status.success() {
            return Err(NetlinkError::OperationFailed {
                op,
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl NetlinkClient for RtNetlinkClient {
    async fn link_exists(&self, name: &str) -> Result<bool, NetlinkError> {
        let (connection, handle, _) =
            rtnetlink::new_connection().map_err(|e| NetlinkError::OperationFailed {
                op: "link_exists",
                detail: e.to_string(),
            })?;
        tokio::spawn(connection);

        let mut links = handle.link().get().match_name(name.to_string()).execute();
        match links.try_next().await {
            Ok(Some(_)) => Ok(true),
            Ok(None) => Ok(false),
            Err(_) => Ok(false),
        }
    }

    async fn link_addresses(&self, name: &str) -> Result<Vec<IpNet>, NetlinkError> {
        let (connection, handle, _) =
            rtnetlink::new_connection().map_err(|e| NetlinkError::OperationFailed {
                op: "link_addresses",
                detail: e.to_string(),
            })?;
        tokio::spawn(connection);

        let mut links = handle.link().get().match_name(name.to_string()).execute();
        let link = links
            .try_next()
            .await
            .map_err(|e| NetlinkError::OperationFailed {
                op: "link_addresses",
                detail: e.to_string(),
            })?
            .ok_or_else(|| NetlinkError::LinkNotFound(name.to_string()))?;
        let index = link.header.index;

        let mut addrs = handle.address().get().set_link_index_filter(index).execute();
        let mut out = Vec::new();
        while let Some(msg) = addrs.try_next().await.map_err(|e| NetlinkError::OperationFailed {
            op: "link_addresses",
            detail: e.to_string(),
        })? {
            for attr in &msg.attributes {
                if let netlink_packet_route::address::AddressAttribute::Address(
                    std::net::IpAddr::V4(v4),
                ) = attr
                {
                    out.push(IpNet {
                        addr: *v4,
                        prefix_len: msg.header.prefix_len,
                    });
                }
            }
        }
        Ok(out)
    }

    async fn set_link_up(&self, netns_pid: i32, name: &str) -> Result<(), NetlinkError> {
        self.run_in_netns("set_link_up", netns_pid, &["ip", "link", "set", name, "up"])
            .await
    }

    async fn add_address(
        &self,
        netns_pid: i32,
        name: &str,
        addr: IpNet,
    ) -> Result<(), NetlinkError> {
        let addr_str = addr.to_string();
        self.run_in_netns(
            "add_address",
            netns_pid,
            &["ip", "addr", "add", &addr_str, "dev", name],
        )
        .await
    }

    async fn add_default_route(
        &self,
        netns_pid: i32,
        via: Ipv4Addr,
    ) -> Result<(), NetlinkError> {
        let via_str = via.to_string();
        self.run_in_netns(
            "add_default_route",
            netns_pid,
            &["ip", "route", "add", "default", "via", &via_str],
        )
        .await
    }

    async fn del_address(
        &self,
        netns_pid: i32,
        name: &str,
        addr: IpNet,
    ) -> Result<(), NetlinkError> {
        let addr_str = addr.to_string();
        self.run_in_netns(
            "del_address",
            netns_pid,
            &["ip", "addr", "del", &addr_str, "dev", name],
        )
        .await
    }

    async fn set_link_down(&self, netns_pid: i32, name: &str) -> Result<(), NetlinkError> {
        self.run_in_netns("set_link_down", netns_pid, &["ip", "link", "set", name, "down"])
            .await
    }
}
