// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory `NetlinkClient` for tests.
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{IpNet, NetlinkClient, NetlinkError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum NetlinkCall {
    SetLinkUp { netns_pid: i32, name: String },
    AddAddress { netns_pid: i32, name: String, addr: IpNet },
    AddDefaultRoute { netns_pid: i32, via: Ipv4Addr },
    DelAddress { netns_pid: i32, name: String, addr: IpNet },
    SetLinkDown { netns_pid: i32, name: String },
}

struct Inner {
    links: HashMap<String, Vec<IpNet>>,
    calls: Vec<NetlinkCall>,
    fail_stage: HashMap<&'static str, String>,
}

/// Fake netlink client seeded with the host bridges a test wants to
/// pretend exist, plus their currently-assigned addresses.
#[derive(Clone)]
pub struct FakeNetlinkClient {
    inner: Arc<Mutex<Inner>>,
}

impl Default for FakeNetlinkClient {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                links: HashMap::new(),
                calls: Vec::new(),
                fail_stage: HashMap::new(),
            })),
        }
    }
}

impl FakeNetlinkClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_link(&self, name: &str, addresses: Vec<IpNet>) {
        self.inner.lock().links.insert(name.to_string(), addresses);
    }

    pub fn calls(&self) -> Vec<NetlinkCall> {
        self.inner.lock().calls.clone()
    }

    /// Makes the named operation fail on its next invocation, for testing
    /// rollback of a partially-applied bring-up sequence.
    pub fn fail_next(&self, stage: &'static str, detail: impl Into<String>) {
        self.inner.lock().fail_stage.insert(stage, detail.into());
    }

    fn maybe_fail(&self, stage: &'static str) -> Result<(), NetlinkError> {
        let mut inner = self.inner.lock();
        if let Some(detail) = inner.fail_stage.remove(stage) {
            return Err(NetlinkError::OperationFailed { op: stage, detail });
        }
        Ok(())
    }
}

#[async_trait]
impl NetlinkClient for FakeNetlinkClient {
    async fn link_exists(&self, name: &str) -> Result<bool, NetlinkError> {
        Ok(self.inner.lock().links.contains_key(name))
    }

    async fn link_addresses(&self, name: &str) -> Result<Vec<IpNet>, NetlinkError> {
        self.inner
            .lock()
            .links
            .get(name)
            .cloned()
            .ok_or_else(|| NetlinkError::LinkNotFound(name.to_string()))
    }

    async fn set_link_up(&self, netns_pid: i32, name: &str) -> Result<(), NetlinkError> {
        self.maybe_fail("set_link_up")?;
        self.inner.lock().calls.push(NetlinkCall::SetLinkUp {
            netns_pid,
            name: name.to_string(),
        });
        Ok(())
    }

    async fn add_address(
        &self,
        netns_pid: i32,
        name: &str,
        addr: IpNet,
    ) -> Result<(), NetlinkError> {
        self.maybe_fail("add_address")?;
        self.inner.lock().calls.push(NetlinkCall::AddAddress {
            netns_pid,
            name: name.to_string(),
            addr,
        });
        Ok(())
    }

    async fn add_default_route(
        &self,
        netns_pid: i32,
        via: Ipv4Addr,
    ) -> Result<(), NetlinkError> {
        self.maybe_fail("add_default_route")?;
        self.inner
            .lock()
            .calls
            .push(NetlinkCall::AddDefaultRoute { netns_pid, via });
        Ok(())
    }

    async fn del_address(
        &self,
        netns_pid: i32,
        name: &str,
        addr: IpNet,
    ) -> Result<(), NetlinkError> {
        self.inner.lock().calls.push(NetlinkCall::DelAddress {
            netns_pid,
            name: name.to_string(),
            addr,
        });
        Ok(())
    }

    async fn set_link_down(&self, netns_pid: i32, name: &str) -> Result<(), NetlinkError> {
        self.inner.lock().calls.push(NetlinkCall::SetLinkDown {
            netns_pid,
            name: name.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
