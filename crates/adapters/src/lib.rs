// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! sc-adapters: the boundary to the host. The `ContainerDriver` trait (C4)
//! adapts the underlying OS container primitive, `NetlinkClient` (C3) wraps
//! kernel netlink for the Network gateway, and the filesystem toolkit (C2)
//! provides the mount/write primitives every gateway and the Container
//! lifecycle build on. Each seam ships a real, subprocess/netlink-backed
//! implementation plus a `Fake` behind `test-support`.

pub mod driver;
pub mod env;
pub mod fs_toolkit;
pub mod netlink;
pub mod subprocess;

pub use driver::{ContainerDriver, DriverError, DriverState, LxcContainerDriver};
pub use env::{dbus_socket_poll_ms, driver_state_poll_ms};
pub use fs_toolkit::FsToolkitError;
pub use netlink::{IpNet, NetlinkClient, NetlinkError, RtNetlinkClient};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use driver::{DriverCall, FakeContainerDriver};
#[cfg(any(test, feature = "test-support"))]
pub use netlink::{FakeNetlinkClient, NetlinkCall};
