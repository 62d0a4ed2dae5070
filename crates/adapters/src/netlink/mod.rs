// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `NetlinkClient` (C3): a typed wrapper over kernel netlink for the
//! operations the Network gateway needs — verifying the host bridge,
//! bringing up `eth0` inside a container's network namespace, assigning
//! its derived IP, and setting the default route (§4.4).

mod real;

#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use real::RtNetlinkClient;

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeNetlinkClient, NetlinkCall};

use async_trait::async_trait;
use std::net::Ipv4Addr;
use thiserror::Error;

/// An IPv4 address plus prefix length, e.g. `10.0.3.5/24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpNet {
    pub addr: Ipv4Addr,
    pub prefix_len: u8,
}

impl std::fmt::Display for IpNet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetlinkError {
    #[error("link `{0}` not found")]
    LinkNotFound(String),

    #[error("netlink operation `{op}` failed: {detail}")]
    OperationFailed { op: &'static str, detail: String },
}

/// Typed netlink operations used by the Network gateway (§4.4). Host
/// bridge queries (`link_exists`/`link_addresses`) run genuine netlink
/// requests in the current namespace; the in-container mutations target a
/// namespace identified by the PID of a process already running inside it
/// (normally the container's init PID, from `ContainerDriver::netns_pid`).
#[async_trait]
pub trait NetlinkClient: Send + Sync + 'static {
    /// Whether a link with this name exists in the host namespace.
    async fn link_exists(&self, name: &str) -> Result<bool, NetlinkError>;

    /// Addresses currently assigned to a host-namespace link.
    async fn link_addresses(&self, name: &str) -> Result<Vec<IpNet>, NetlinkError>;

    /// Brings `name` up inside the namespace of `netns_pid`.
    async fn set_link_up(&self, netns_pid: i32, name: &str) -> Result<(), NetlinkError>;

    /// Assigns `addr` to `name` inside the namespace of `netns_pid`.
    async fn add_address(
        &self,
        netns_pid: i32,
        name: &str,
        addr: IpNet,
    ) -> Result<(), NetlinkError>;

    /// Sets the default route inside the namespace of `netns_pid` via `via`.
    async fn add_default_route(
        &self,
        netns_pid: i32,
        via: Ipv4Addr,
    ) -> Result<(), NetlinkError>;

    /// Removes `addr` from `name` inside the namespace of `netns_pid`.
    /// Inverts `add_address`, for local rollback of a partially-applied
    /// bring-up sequence.
    async fn del_address(
        &self,
        netns_pid: i32,
        name: &str,
        addr: IpNet,
    ) -> Result<(), NetlinkError>;

    /// Brings `name` down inside the namespace of `netns_pid`. Inverts
    /// `set_link_up`.
    async fn set_link_down(&self, netns_pid: i32, name: &str) -> Result<(), NetlinkError>;
}
