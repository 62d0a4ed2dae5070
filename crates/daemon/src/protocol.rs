// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol types for the Agent Core's RPC surface (§6).
//!
//! The real transport (a D-Bus object) is an external collaborator outside
//! this crate. This module gives the Agent Core a concrete transport to be
//! driven through end to end: a Unix socket carrying length-prefixed JSON
//! frames for SoftwareContainer's RPC operations.

#[path = "protocol_wire.rs"]
mod wire;

pub use wire::{
    decode, encode, read_message, read_request, write_message, write_response, ProtocolError,
    DEFAULT_TIMEOUT, MAX_MESSAGE_SIZE, PROTOCOL_VERSION,
};

use sc_core::CapabilityName;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::event_bus::ProcessStateChanged;

/// One call against the Agent Core's RPC surface (§6's table), plus
/// `Subscribe`, the stand-in for a client attaching to the
/// **ProcessStateChanged** signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum Request {
    Ping,

    CreateContainer {
        prefix: String,
    },

    SetCapabilities {
        handle: u32,
        ids: Vec<String>,
    },

    /// Raw-fragments shortcut for tests (§6): `configs` maps a
    /// gateway ID directly to a JSON-encoded fragment or array of
    /// fragments, bypassing the Manifest Store.
    SetGatewayConfigs {
        handle: u32,
        configs: HashMap<String, String>,
    },

    LaunchCommand {
        handle: u32,
        #[serde(default)]
        user: Option<u32>,
        cmdline: Vec<String>,
        #[serde(default)]
        cwd: Option<PathBuf>,
        #[serde(default)]
        out_file: Option<PathBuf>,
        #[serde(default)]
        env: HashMap<String, String>,
    },

    WriteToStdIn {
        pid: i32,
        bytes: Vec<u8>,
    },

    ShutDownContainer {
        handle: u32,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },

    BindMountFolderInContainer {
        handle: u32,
        host_path: PathBuf,
        container_path: PathBuf,
        #[serde(default)]
        read_only: bool,
    },

    /// Attaches this connection to the `ProcessStateChanged` signal;
    /// the connection stays open and receives `Response::Signal` frames
    /// until the client disconnects.
    Subscribe,
}

impl Request {
    pub fn capability_ids(&self) -> Option<Vec<CapabilityName>> {
        match self {
            Request::SetCapabilities { ids, .. } => {
                Some(ids.iter().map(|s| CapabilityName::new(s.as_str())).collect())
            }
            _ => None,
        }
    }
}

/// The Agent Core's reply to one `Request`, or one fire-and-forget
/// `ProcessStateChanged` frame pushed down a `Subscribe` connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Response {
    Pong,
    Ok,
    Handle { handle: u32 },
    Pid { pid: i32 },
    Path { path: PathBuf },
    /// `error_kind` is the short machine-readable name from §7's error
    /// taxonomy (e.g. `"state_mismatch"`, `"unknown_handle"`); `message` is
    /// the human-readable detail.
    Error { error_kind: String, message: String },
    Signal {
        handle: u32,
        pid: i32,
        is_running: bool,
        exit_code: i32,
    },
}

impl From<ProcessStateChanged> for Response {
    fn from(s: ProcessStateChanged) -> Self {
        Response::Signal {
            handle: s.handle.0,
            pid: s.pid,
            is_running: s.is_running,
            exit_code: s.exit_code,
        }
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
