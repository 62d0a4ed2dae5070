// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn network_entry_parses_minimum_example_from_spec() {
    let json = serde_json::json!({
        "direction": "OUTGOING",
        "allow": [{"host": "*", "ports": "80:443", "protocols": "tcp"}]
    });
    let entry: NetworkEntry = serde_json::from_value(json).unwrap();
    assert_eq!(entry.direction, NetworkDirection::Outgoing);
    assert_eq!(entry.direction.chain(), "OUTPUT");
    assert_eq!(entry.allow.len(), 1);
    assert_eq!(entry.allow[0].host, "*");
    assert_eq!(
        entry.allow[0].ports,
        Some(PortSpec::Range("80:443".to_string()))
    );
    assert_eq!(
        entry.allow[0].protocols.as_ref().unwrap().as_vec(),
        vec![Protocol::Tcp]
    );
}

#[test]
fn network_rule_accepts_port_list_and_protocol_list() {
    let json = serde_json::json!({
        "host": "10.0.0.1",
        "ports": [80, 443],
        "protocols": ["tcp", "udp"]
    });
    let rule: NetworkRule = serde_json::from_value(json).unwrap();
    assert_eq!(rule.ports, Some(PortSpec::List(vec![80, 443])));
    assert_eq!(
        rule.protocols.unwrap().as_vec(),
        vec![Protocol::Tcp, Protocol::Udp]
    );
}

#[test]
fn device_mode_parses_three_octal_digits() {
    let mode: DeviceMode = serde_json::from_value(serde_json::json!("622")).unwrap();
    assert_eq!(mode, DeviceMode::new(6, 2, 2).unwrap());
}

#[test]
fn device_mode_rejects_non_octal_digit() {
    let result: Result<DeviceMode, _> = serde_json::from_value(serde_json::json!("988"));
    assert!(result.is_err());
}

#[test]
fn device_mode_union_is_digitwise_max() {
    let a = DeviceMode::new(6, 2, 2).unwrap();
    let b = DeviceMode::new(7, 5, 5).unwrap();
    assert_eq!(a.union(&b), DeviceMode::new(7, 5, 5).unwrap());

    let c = DeviceMode::new(4, 4, 4).unwrap();
    let d = DeviceMode::new(2, 6, 6).unwrap();
    assert_eq!(c.union(&d), DeviceMode::new(4, 6, 6).unwrap());
}

#[test]
fn device_mode_new_rejects_digit_above_seven() {
    assert_eq!(DeviceMode::new(8, 0, 0), None);
}

#[test]
fn env_mode_defaults_to_set() {
    let entry: EnvEntry = serde_json::from_value(serde_json::json!({
        "name": "PATH",
        "value": "/opt/bin"
    }))
    .unwrap();
    assert_eq!(entry.mode, EnvMode::Set);
    assert_eq!(entry.separator, "");
}

#[test]
fn env_mode_parse_is_case_insensitive() {
    assert_eq!(EnvMode::parse("APPEND"), Some(EnvMode::Append));
    assert_eq!(EnvMode::parse("Prepend"), Some(EnvMode::Prepend));
    assert_eq!(EnvMode::parse("bogus"), None);
}

#[test]
fn env_entry_deserializes_a_mixed_case_mode() {
    let entry: EnvEntry = serde_json::from_value(serde_json::json!({
        "name": "PATH",
        "value": "/opt/bin",
        "mode": "Append"
    }))
    .unwrap();
    assert_eq!(entry.mode, EnvMode::Append);
}

#[test]
fn env_entry_rejects_an_unknown_mode() {
    let result: Result<EnvEntry, _> = serde_json::from_value(serde_json::json!({
        "name": "PATH",
        "value": "/opt/bin",
        "mode": "clobber"
    }));
    assert!(result.is_err());
}

#[test]
fn dbus_config_requires_neither_array_to_deserialize_but_tracks_emptiness() {
    let config: DBusConfig = serde_json::from_value(serde_json::json!({})).unwrap();
    assert!(config.is_empty());

    let config: DBusConfig = serde_json::from_value(serde_json::json!({
        "dbus-gateway-config-session": [{"name": "rule"}]
    }))
    .unwrap();
    assert!(!config.is_empty());
    assert_eq!(config.session.len(), 1);
}
