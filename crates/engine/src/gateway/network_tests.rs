use super::*;
use crate::container::Container;
use sc_adapters::{FakeContainerDriver, FakeNetlinkClient, NetlinkCall};
use sc_core::ContainerId;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn default_bridge_addrs() -> Vec<IpNet> {
    vec![IpNet {
        addr: Ipv4Addr::new(10, 0, 3, 1),
        prefix_len: 24,
    }]
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

fn test_host_config() -> NetworkHostConfig {
    NetworkHostConfig {
        bridge_name: "sc-br0".to_string(),
        gateway_ip: Ipv4Addr::new(10, 0, 3, 1),
        prefix_len: 24,
        iptables_path: PathBuf::from("true"),
    }
}

#[test]
fn derive_container_ip_basic() {
    let ip = derive_container_ip(Ipv4Addr::new(10, 0, 3, 1), 24, 0).unwrap();
    assert_eq!(ip, Ipv4Addr::new(10, 0, 3, 2));
    let ip = derive_container_ip(Ipv4Addr::new(10, 0, 3, 1), 24, 4).unwrap();
    assert_eq!(ip, Ipv4Addr::new(10, 0, 3, 6));
}

#[test]
fn derive_container_ip_rejects_short_netmask() {
    assert!(matches!(
        derive_container_ip(Ipv4Addr::new(10, 0, 3, 1), 7, 0),
        Err(ResourceError::IPExhausted)
    ));
}

#[test]
fn derive_container_ip_rejects_overflow() {
    // /30 leaves 2 usable host bits (capacity 4); index 3 -> host_part 4 overflows.
    assert!(matches!(
        derive_container_ip(Ipv4Addr::new(10, 0, 3, 1), 30, 3),
        Err(ResourceError::IPExhausted)
    ));
}

#[tokio::test]
async fn activate_fails_when_bridge_missing() {
    let root = TempDir::new().unwrap();
    let container = started_container(&root).await;
    let netlink = Arc::new(FakeNetlinkClient::new());
    let gw = NetworkGateway::new(netlink, test_host_config(), 0);
    gw.read_config_element(&json!({"direction": "OUTGOING", "allow": []})).unwrap();
    assert!(gw.activate(&container).await.is_err());
}

#[tokio::test]
async fn activate_fails_when_bridge_address_mismatches() {
    let root = TempDir::new().unwrap();
    let container = started_container(&root).await;
    let netlink = Arc::new(FakeNetlinkClient::new());
    netlink.seed_link(
        "sc-br0",
        vec![IpNet {
            addr: Ipv4Addr::new(192, 168, 1, 1),
            prefix_len: 24,
        }],
    );
    let gw = NetworkGateway::new(netlink, test_host_config(), 0);
    gw.read_config_element(&json!({"direction": "OUTGOING", "allow": []})).unwrap();
    assert!(gw.activate(&container).await.is_err());
}

#[tokio::test]
async fn activate_succeeds_and_configures_namespace() {
    let root = TempDir::new().unwrap();
    let container = started_container(&root).await;
    let netlink = Arc::new(FakeNetlinkClient::new());
    netlink.seed_link("sc-br0", default_bridge_addrs());
    let gw = NetworkGateway::new(netlink.clone(), test_host_config(), 3);
    gw.read_config_element(&json!({
        "direction": "OUTGOING",
        "allow": [{"host": "*", "protocols": "tcp", "ports": 443}],
    }))
    .unwrap();

    gw.activate(&container).await.unwrap();
    assert_eq!(gw.state(), GatewayState::Activated);

    let calls = netlink.calls();
    assert_eq!(calls.len(), 3);
}

#[tokio::test]
async fn reactivating_after_new_entries_does_not_redo_bring_up() {
    let root = TempDir::new().unwrap();
    let container = started_container(&root).await;
    let netlink = Arc::new(FakeNetlinkClient::new());
    netlink.seed_link("sc-br0", default_bridge_addrs());
    let gw = NetworkGateway::new(netlink.clone(), test_host_config(), 3);
    gw.read_config_element(&json!({
        "direction": "OUTGOING",
        "allow": [{"host": "*", "protocols": "tcp", "ports": 443}],
    }))
    .unwrap();
    gw.activate(&container).await.unwrap();
    let calls_after_first = netlink.calls().len();

    gw.read_config_element(&json!({
        "direction": "INCOMING",
        "allow": [{"host": "*", "protocols": "tcp", "ports": 22}],
    }))
    .unwrap();
    gw.activate(&container).await.unwrap();

    // Bring-up (set_link_up/add_address/add_default_route) only happened
    // once; the fake records no further netlink calls for iptables rules.
    assert_eq!(netlink.calls().len(), calls_after_first);
    assert_eq!(*gw.applied.lock(), 2);
}

#[tokio::test]
async fn failed_default_route_rolls_back_the_address_and_link() {
    let root = TempDir::new().unwrap();
    let container = started_container(&root).await;
    let netlink = Arc::new(FakeNetlinkClient::new());
    netlink.seed_link("sc-br0", default_bridge_addrs());
    netlink.fail_next("add_default_route", "simulated failure");
    let gw = NetworkGateway::new(netlink.clone(), test_host_config(), 0);
    gw.read_config_element(&json!({"direction": "OUTGOING", "allow": []})).unwrap();

    assert!(gw.activate(&container).await.is_err());

    let calls = netlink.calls();
    assert!(matches!(calls[0], NetlinkCall::SetLinkUp { .. }));
    assert!(matches!(calls[1], NetlinkCall::AddAddress { .. }));
    assert!(matches!(calls[2], NetlinkCall::DelAddress { .. }));
    assert!(matches!(calls[3], NetlinkCall::SetLinkDown { .. }));
    assert!(!*gw.bound.lock());

    // Retrying without the injected failure succeeds cleanly.
    gw.activate(&container).await.unwrap();
}

#[tokio::test]
async fn activate_with_no_entries_fails() {
    let root = TempDir::new().unwrap();
    let container = started_container(&root).await;
    let netlink = Arc::new(FakeNetlinkClient::new());
    let gw = NetworkGateway::new(netlink, test_host_config(), 0);
    assert!(gw.activate(&container).await.is_err());
}

#[test]
fn rule_commands_builds_single_port_rule() {
    let netlink = Arc::new(FakeNetlinkClient::new());
    let gw = NetworkGateway::new(netlink, test_host_config(), 0);
    let entry: NetworkEntry = serde_json::from_value(json!({
        "direction": "OUTGOING",
        "allow": [{"host": "*", "protocols": "tcp", "ports": 443}],
    }))
    .unwrap();
    let commands = gw.rule_commands("OUTPUT", &entry);
    assert_eq!(commands.len(), 1);
    let args = &commands[0];
    assert!(args.contains(&"--dport".to_string()));
    assert!(args.contains(&"443".to_string()));
    assert!(!args.iter().any(|a| a == "-s" || a == "-d"));
}

#[test]
fn rule_commands_builds_multiport_list_rule() {
    let netlink = Arc::new(FakeNetlinkClient::new());
    let gw = NetworkGateway::new(netlink, test_host_config(), 0);
    let entry: NetworkEntry = serde_json::from_value(json!({
        "direction": "INCOMING",
        "allow": [{"host": "10.0.3.5", "protocols": "tcp", "ports": [80, 443]}],
    }))
    .unwrap();
    let commands = gw.rule_commands("INPUT", &entry);
    assert_eq!(commands.len(), 1);
    let args = &commands[0];
    assert!(args.contains(&"--dports".to_string()));
    assert!(args.contains(&"80,443".to_string()));
    assert!(args.contains(&"-s".to_string()));
}

#[test]
fn rule_commands_emits_one_command_per_protocol() {
    let netlink = Arc::new(FakeNetlinkClient::new());
    let gw = NetworkGateway::new(netlink, test_host_config(), 0);
    let entry: NetworkEntry = serde_json::from_value(json!({
        "direction": "OUTGOING",
        "allow": [{"host": "*", "protocols": ["tcp", "udp"], "ports": "1000:2000"}],
    }))
    .unwrap();
    let commands = gw.rule_commands("OUTPUT", &entry);
    assert_eq!(commands.len(), 2);
    assert!(commands.iter().any(|c| c.contains(&"tcp".to_string())));
    assert!(commands.iter().any(|c| c.contains(&"udp".to_string())));
    assert!(commands.iter().any(|c| c.contains(&"1000:2000".to_string())));
}
