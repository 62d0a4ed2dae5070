// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job data model (§3, §4.10). A Job is a process spawned inside a
//! Container; the Agent Core's job table keys live Jobs by PID.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// How one of a Job's standard streams should be wired up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StdioSpec {
    /// Not captured; inherits the container's init process's stream.
    Inherit,
    /// Discarded.
    Null,
    /// Captured as a pipe the Agent Core can read from or write to.
    Piped,
    /// Redirected to a file path inside the container.
    RedirectToFile(PathBuf),
}

/// The parameters of a `launch`/`execute` request (§4.1, §4.10).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    pub cmdline: Vec<String>,
    #[serde(default)]
    pub user: Option<u32>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Per-call environment overrides. Spec §4.1: merged with the
    /// container's gateway environment, per-call wins.
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default = "default_stdio")]
    pub stdin: StdioSpec,
    #[serde(default = "default_stdio")]
    pub stdout: StdioSpec,
    #[serde(default = "default_stdio")]
    pub stderr: StdioSpec,
}

fn default_stdio() -> StdioSpec {
    StdioSpec::Inherit
}

/// A live Job, keyed by PID in the Agent Core's job table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub pid: i32,
    pub config: JobConfig,
    /// Whether this Job was started with a captured stdin pipe; `write_stdin`
    /// fails for Jobs where this is false (§4.10).
    pub has_stdin_pipe: bool,
}

impl JobRecord {
    pub fn new(pid: i32, config: JobConfig) -> Self {
        let has_stdin_pipe = matches!(config.stdin, StdioSpec::Piped);
        Self {
            pid,
            config,
            has_stdin_pipe,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
