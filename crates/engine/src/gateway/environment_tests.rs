use super::*;
use crate::container::Container;
use sc_adapters::FakeContainerDriver;
use sc_core::ContainerId;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

async fn started_container(root: &TempDir) -> Container {
    let c = Container::new(
        ContainerId::new("c1"),
        root.path(),
        false,
        Duration::from_secs(2),
        Arc::new(FakeContainerDriver::new()),
    );
    c.initialize().await.unwrap();
    c.create().await.unwrap();
    c.start().await.unwrap();
    c
}

#[tokio::test]
async fn append_on_absent_variable_creates_it() {
    let root = TempDir::new().unwrap();
    let container = started_container(&root).await;
    let gw = EnvironmentGateway::new();
    gw.read_config_element(&json!({"name": "PATH", "value": "/opt/bin", "mode": "append", "separator": ":"}))
        .unwrap();
    gw.activate(&container).await.unwrap();
    assert_eq!(container.environment().get("PATH"), Some(&"/opt/bin".to_string()));
}

#[tokio::test]
async fn append_on_present_variable_appends_with_separator() {
    let root = TempDir::new().unwrap();
    let container = started_container(&root).await;
    container.set_environment_variable("PATH", "/usr/bin").unwrap();

    let gw = EnvironmentGateway::new();
    gw.read_config_element(&json!({"name": "PATH", "value": "/opt/bin", "mode": "append", "separator": ":"}))
        .unwrap();
    gw.activate(&container).await.unwrap();
    assert_eq!(
        container.environment().get("PATH"),
        Some(&"/usr/bin:/opt/bin".to_string())
    );
}

#[tokio::test]
async fn prepend_puts_value_first() {
    let root = TempDir::new().unwrap();
    let container = started_container(&root).await;
    container.set_environment_variable("PATH", "/usr/bin").unwrap();

    let gw = EnvironmentGateway::new();
    gw.read_config_element(&json!({"name": "PATH", "value": "/opt/bin", "mode": "prepend", "separator": ":"}))
        .unwrap();
    gw.activate(&container).await.unwrap();
    assert_eq!(
        container.environment().get("PATH"),
        Some(&"/opt/bin:/usr/bin".to_string())
    );
}

#[tokio::test]
async fn set_on_present_variable_errors() {
    let root = TempDir::new().unwrap();
    let container = started_container(&root).await;
    container.set_environment_variable("PATH", "/usr/bin").unwrap();

    let gw = EnvironmentGateway::new();
    gw.read_config_element(&json!({"name": "PATH", "value": "/opt/bin"})).unwrap();
    let err = gw.activate(&container).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::GatewayActivation(GatewayActivationError::Precondition(_))
    ));
}

#[tokio::test]
async fn activate_with_no_entries_fails() {
    let root = TempDir::new().unwrap();
    let container = started_container(&root).await;
    let gw = EnvironmentGateway::new();
    let err = gw.activate(&container).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::GatewayActivation(GatewayActivationError::Precondition(_))
    ));
}

#[tokio::test]
async fn second_activate_only_applies_newly_added_entries() {
    let root = TempDir::new().unwrap();
    let container = started_container(&root).await;
    let gw = EnvironmentGateway::new();
    gw.read_config_element(&json!({"name": "A", "value": "1"})).unwrap();
    gw.activate(&container).await.unwrap();

    gw.read_config_element(&json!({"name": "B", "value": "2"})).unwrap();
    gw.activate(&container).await.unwrap();

    assert_eq!(container.environment().get("A"), Some(&"1".to_string()));
    assert_eq!(container.environment().get("B"), Some(&"2".to_string()));
}

#[tokio::test]
async fn reactivating_after_adding_the_same_name_again_still_conflicts() {
    // A fresh `set` fragment for an already-set name is a real conflict
    // (not history replay), so it must still surface as an error.
    let root = TempDir::new().unwrap();
    let container = started_container(&root).await;
    let gw = EnvironmentGateway::new();
    gw.read_config_element(&json!({"name": "A", "value": "1"})).unwrap();
    gw.activate(&container).await.unwrap();
    gw.read_config_element(&json!({"name": "A", "value": "1"})).unwrap();
    assert!(gw.activate(&container).await.is_err());
}

#[test]
fn unknown_mode_is_rejected_at_config_time() {
    let gw = EnvironmentGateway::new();
    let err = gw
        .read_config_element(&json!({"name": "PATH", "value": "/opt/bin", "mode": "clobber"}))
        .unwrap_err();
    assert!(matches!(err, GatewayConfigError::FieldType { .. }));
}
