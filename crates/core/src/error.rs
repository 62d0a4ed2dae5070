// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy (see §7). Each kind is surfaced to RPC callers as a
//! short machine-readable variant name plus a human-readable message.

use thiserror::Error;

/// Errors raised while loading or querying service manifests.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ManifestError {
    #[error("manifest path invalid: {0}")]
    PathInvalid(String),

    #[error("manifest parse failure: {0}")]
    ParseFailure(String),

    #[error("manifest schema violation in field `{field}`: {detail}")]
    SchemaViolation { field: String, detail: String },

    #[error("capability `{0}` would be destructively redefined")]
    DuplicateDestructive(String),
}

/// Errors raised while a gateway accumulates configuration (`readConfigElement`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayConfigError {
    #[error("gateway has no accumulated configuration")]
    Empty,

    #[error("field `{0}` is required but missing")]
    FieldMissing(String),

    #[error("field `{field}` has the wrong type, expected {expected}")]
    FieldType { field: String, expected: String },

    #[error("value for `{field}` is out of range: {detail}")]
    ValueOutOfRange { field: String, detail: String },

    #[error("value for `{field}` conflicts with an existing setting: {detail}")]
    ConflictWithExisting { field: String, detail: String },
}

/// Errors raised while activating or tearing down a gateway.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayActivationError {
    #[error("activation precondition not met: {0}")]
    Precondition(String),

    #[error("required host resource unavailable: {0}")]
    HostResourceUnavailable(String),

    #[error("kernel call `{op}` failed: {detail}")]
    KernelCallFailed { op: &'static str, detail: String },
}

/// Errors raised by the Container lifecycle state machine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContainerError {
    #[error("container driver failed during `{stage}`: {detail}")]
    DriverFailed { stage: &'static str, detail: String },

    #[error("container is in state {actual:?}, expected {expected:?}")]
    StateMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("timed out waiting for `{stage}`")]
    Timeout { stage: &'static str },
}

/// Errors raised by filesystem/network resource acquisition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("no IP address available in the configured subnet")]
    IPExhausted,

    #[error("mount failed at `{0}`")]
    MountFailed(String),

    #[error("cleanup did not complete: {0}")]
    CleanupIncomplete(String),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
