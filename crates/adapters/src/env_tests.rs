// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

#[test]
#[serial]
fn driver_state_poll_ms_defaults_when_unset() {
    std::env::remove_var("SC_DRIVER_STATE_POLL_MS");
    assert_eq!(driver_state_poll_ms(), Duration::from_millis(200));
}

#[test]
#[serial]
fn driver_state_poll_ms_reads_the_env_override() {
    std::env::set_var("SC_DRIVER_STATE_POLL_MS", "25");
    assert_eq!(driver_state_poll_ms(), Duration::from_millis(25));
    std::env::remove_var("SC_DRIVER_STATE_POLL_MS");
}

#[test]
#[serial]
fn driver_state_poll_ms_falls_back_on_unparseable_value() {
    std::env::set_var("SC_DRIVER_STATE_POLL_MS", "not-a-number");
    assert_eq!(driver_state_poll_ms(), Duration::from_millis(200));
    std::env::remove_var("SC_DRIVER_STATE_POLL_MS");
}

#[test]
#[serial]
fn dbus_socket_poll_ms_defaults_when_unset() {
    std::env::remove_var("SC_DBUS_SOCKET_POLL_MS");
    assert_eq!(dbus_socket_poll_ms(), Duration::from_millis(50));
}

#[test]
#[serial]
fn dbus_socket_poll_ms_reads_the_env_override() {
    std::env::set_var("SC_DBUS_SOCKET_POLL_MS", "5");
    assert_eq!(dbus_socket_poll_ms(), Duration::from_millis(5));
    std::env::remove_var("SC_DBUS_SOCKET_POLL_MS");
}
