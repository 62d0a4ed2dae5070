use super::*;
use crate::container::Container;
use sc_adapters::{FakeContainerDriver, FakeNetlinkClient};
use sc_core::ContainerId;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

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

fn gateway_set() -> GatewaySet {
    GatewaySet::new(Arc::new(FakeNetlinkClient::new()), network::NetworkHostConfig::default(), 0)
}

#[tokio::test]
async fn activates_configured_gateways_and_skips_unconfigured() {
    let root = TempDir::new().unwrap();
    let container = started_container(&root).await;
    let gateways = gateway_set();

    gateways
        .read_config_element("env", &json!({"name": "PATH", "value": "/opt/bin"}))
        .unwrap();
    gateways
        .read_config_element("cgroups", &json!({"setting": "memory.limit_in_bytes", "value": "1024"}))
        .unwrap();

    gateways.activate_all(&container).await.unwrap();

    assert_eq!(gateways.get(GatewayKind::Environment).state(), GatewayState::Activated);
    assert_eq!(gateways.get(GatewayKind::Cgroups).state(), GatewayState::Activated);
    // Network, DeviceNode, File, D-Bus, Pulse, Wayland never received config.
    assert_eq!(gateways.get(GatewayKind::Network).state(), GatewayState::Created);
    assert_eq!(gateways.get(GatewayKind::File).state(), GatewayState::Created);
}

#[tokio::test]
async fn activate_all_rolls_back_prior_gateways_on_later_failure() {
    let root = TempDir::new().unwrap();
    let container = started_container(&root).await;
    let gateways = gateway_set();

    // Environment activates first in the fixed order and will succeed...
    gateways
        .read_config_element("env", &json!({"name": "PATH", "value": "/opt/bin"}))
        .unwrap();
    // ...but Network (next in order) fails since its bridge is never seeded.
    gateways
        .read_config_element("network", &json!({"direction": "OUTGOING", "allow": []}))
        .unwrap();

    let result = gateways.activate_all(&container).await;
    assert!(result.is_err());

    // The activation failure rolled Environment's teardown back.
    assert_eq!(gateways.get(GatewayKind::Environment).state(), GatewayState::TornDown);
    assert_eq!(gateways.get(GatewayKind::Network).state(), GatewayState::Configured);
}

#[tokio::test]
async fn unknown_gateway_id_is_rejected() {
    let gateways = gateway_set();
    let err = gateways.read_config_element("not-a-real-gateway", &json!({}));
    assert!(err.is_err());
}

#[tokio::test]
async fn teardown_all_only_tears_down_activated_gateways() {
    let root = TempDir::new().unwrap();
    let container = started_container(&root).await;
    let gateways = gateway_set();

    gateways
        .read_config_element("env", &json!({"name": "PATH", "value": "/opt/bin"}))
        .unwrap();
    gateways.activate_all(&container).await.unwrap();

    gateways.teardown_all(&container).await;
    assert_eq!(gateways.get(GatewayKind::Environment).state(), GatewayState::TornDown);
}
