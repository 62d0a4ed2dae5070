use super::*;

#[test]
fn driver_failed_wraps_stage_and_detail() {
    let e = driver_failed(
        "start",
        DriverError::CommandFailed {
            stage: "start",
            detail: "boom".to_string(),
        },
    );
    match e {
        EngineError::Container(ContainerError::DriverFailed { stage, detail }) => {
            assert_eq!(stage, "start");
            assert!(detail.contains("boom"));
        }
        other => panic!("unexpected variant: {other:?}"),
    }
}

#[test]
fn mount_failed_carries_path() {
    let e = mount_failed(
        "/run/sc/gw",
        FsToolkitError::MountFailed {
            path: "/run/sc/gw".into(),
            detail: "EBUSY".to_string(),
        },
    );
    match e {
        EngineError::Resource(ResourceError::MountFailed(path)) => {
            assert_eq!(path, "/run/sc/gw");
        }
        other => panic!("unexpected variant: {other:?}"),
    }
}

#[test]
fn netlink_failed_wraps_op_and_detail() {
    let e = netlink_failed(
        "add_address",
        NetlinkError::OperationFailed {
            op: "add_address",
            detail: "EADDRINUSE".to_string(),
        },
    );
    match e {
        EngineError::GatewayActivation(GatewayActivationError::KernelCallFailed { op, detail }) => {
            assert_eq!(op, "add_address");
            assert!(detail.contains("EADDRINUSE"));
        }
        other => panic!("unexpected variant: {other:?}"),
    }
}
