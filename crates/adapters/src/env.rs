// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the adapters crate.

use std::time::Duration;

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Poll interval while waiting for the container driver to report `Running`
/// after `start` (§4.1; default: 200ms).
pub fn driver_state_poll_ms() -> Duration {
    parse_duration_ms("SC_DRIVER_STATE_POLL_MS").unwrap_or(Duration::from_millis(200))
}

/// Poll interval while waiting for a D-Bus proxy socket to appear
/// (§4.8; default: 50ms).
pub fn dbus_socket_poll_ms() -> Duration {
    parse_duration_ms("SC_DBUS_SOCKET_POLL_MS").unwrap_or(Duration::from_millis(50))
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
