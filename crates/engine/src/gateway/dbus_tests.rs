use super::*;
use crate::container::Container;
use sc_adapters::FakeContainerDriver;
use sc_core::ContainerId;
use serde_json::json;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A stand-in policy-proxy: reads its config off stdin, touches the socket
/// path it was given as its first argument, then sleeps so it stays alive
/// long enough for the gateway's socket-appearance poll to observe it.
fn fake_proxy_bin(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("fake-dbus-proxy");
    fs::write(&path, "#!/bin/sh\ncat >/dev/null\ntouch \"$1\"\nsleep 5\n").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn failing_proxy_bin(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("failing-dbus-proxy");
    fs::write(&path, "#!/bin/sh\ncat >/dev/null\nexit 1\n").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

async fn started_container(root: &TempDir) -> Container {
    let driver = FakeContainerDriver::new();
    let c = Container::new(
        ContainerId::new("c1"),
        root.path(),
        false,
        Duration::from_secs(2),
        Arc::new(driver),
    );
    c.initialize().await.unwrap();
    c.create().await.unwrap();
    c.start().await.unwrap();
    c
}

#[test]
fn read_config_element_rejects_empty_fragment() {
    let gw = DBusGateway::new();
    let err = gw.read_config_element(&json!({})).unwrap_err();
    assert!(matches!(err, GatewayConfigError::FieldMissing(_)));
}

#[test]
fn read_config_element_accumulates_across_calls() {
    let gw = DBusGateway::new();
    gw.read_config_element(&json!({"dbus-gateway-config-session": [{"rule": 1}]}))
        .unwrap();
    gw.read_config_element(&json!({"dbus-gateway-config-session": [{"rule": 2}]}))
        .unwrap();
    assert_eq!(gw.session_rules.lock().len(), 2);
    assert!(gw.system_rules.lock().is_empty());
}

#[tokio::test]
async fn activate_fails_with_no_accumulated_config() {
    let root = TempDir::new().unwrap();
    let container = started_container(&root).await;
    let gw = DBusGateway::new();
    assert!(gw.activate(&container).await.is_err());
}

#[tokio::test]
async fn activate_spawns_proxy_and_sets_session_address() {
    let root = TempDir::new().unwrap();
    let container = started_container(&root).await;
    let gw = DBusGateway::with_host_config(DBusHostConfig {
        proxy_path: fake_proxy_bin(&root),
    });
    gw.read_config_element(&json!({"dbus-gateway-config-session": [{"rule": 1}]}))
        .unwrap();

    gw.activate(&container).await.unwrap();

    let env = container.environment();
    let addr = env.get("DBUS_SESSION_BUS_ADDRESS").expect("session address set");
    assert!(addr.starts_with("unix:path=/run/sc-gateway/dbus-session.sock"));
    assert!(container.paths().gateway_dir.join("dbus-session.sock").exists());
    assert_eq!(gw.state(), GatewayState::Activated);
}

#[tokio::test]
async fn activate_spawns_both_buses_independently() {
    let root = TempDir::new().unwrap();
    let container = started_container(&root).await;
    let gw = DBusGateway::with_host_config(DBusHostConfig {
        proxy_path: fake_proxy_bin(&root),
    });
    gw.read_config_element(&json!({
        "dbus-gateway-config-session": [{"rule": 1}],
        "dbus-gateway-config-system": [{"rule": 2}],
    }))
    .unwrap();

    gw.activate(&container).await.unwrap();

    let env = container.environment();
    assert!(env.contains_key("DBUS_SESSION_BUS_ADDRESS"));
    assert!(env.contains_key("DBUS_SYSTEM_BUS_ADDRESS"));
}

#[tokio::test]
async fn reactivating_after_new_rules_does_not_respawn_the_proxy() {
    let root = TempDir::new().unwrap();
    let container = started_container(&root).await;
    let gw = DBusGateway::with_host_config(DBusHostConfig {
        proxy_path: fake_proxy_bin(&root),
    });
    gw.read_config_element(&json!({"dbus-gateway-config-session": [{"rule": 1}]}))
        .unwrap();
    gw.activate(&container).await.unwrap();
    let first_addr = container.environment().get("DBUS_SESSION_BUS_ADDRESS").cloned();

    gw.read_config_element(&json!({"dbus-gateway-config-session": [{"rule": 2}]}))
        .unwrap();
    gw.activate(&container).await.unwrap();
    let second_addr = container.environment().get("DBUS_SESSION_BUS_ADDRESS").cloned();

    // Same proxy, same socket: the second activate must not spawn another.
    assert_eq!(first_addr, second_addr);
    assert!(*gw.session_spawned.lock());
}

#[tokio::test]
async fn activate_fails_when_proxy_exits_without_creating_socket() {
    let root = TempDir::new().unwrap();
    let container = started_container(&root).await;
    let gw = DBusGateway::with_host_config(DBusHostConfig {
        proxy_path: failing_proxy_bin(&root),
    });
    gw.read_config_element(&json!({"dbus-gateway-config-session": [{"rule": 1}]}))
        .unwrap();

    assert!(gw.activate(&container).await.is_err());
}
