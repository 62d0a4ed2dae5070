// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn manifest_schema_violation_message_names_the_field() {
    let err = ManifestError::SchemaViolation {
        field: "capabilities".into(),
        detail: "must be an array".into(),
    };
    assert!(err.to_string().contains("capabilities"));
}

#[test]
fn gateway_activation_kernel_call_failed_message_names_the_op() {
    let err = GatewayActivationError::KernelCallFailed {
        op: "mount",
        detail: "EPERM".into(),
    };
    assert!(err.to_string().contains("mount"));
}

#[test]
fn container_state_mismatch_message_names_both_states() {
    let err = ContainerError::StateMismatch {
        expected: "Started",
        actual: "Created",
    };
    let msg = err.to_string();
    assert!(msg.contains("Started"));
    assert!(msg.contains("Created"));
}
