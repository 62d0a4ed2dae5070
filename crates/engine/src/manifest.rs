// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capability/Manifest Store (C8, §4.9): loads service manifests from
//! a directory, a single file, or in-memory strings, merges capabilities
//! sharing a name across manifests, and answers the two query surfaces the
//! Agent Core drives gateway configuration from.

use sc_core::{configs_for, merge_capabilities, parse_capabilities, Capability, CapabilityName, GatewayConfiguration, ManifestError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Parsed and merged capability set. Parse errors are terminal for the
/// whole load (§4.9): the first manifest that fails to parse aborts
/// the load and nothing from it, or from any sibling manifest in the same
/// call, becomes queryable.
#[derive(Debug, Default)]
pub struct ManifestStore {
    capabilities: HashMap<CapabilityName, Capability>,
}

impl ManifestStore {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads manifests from `path`: recursively from a directory (every
    /// file ending in `.json`), or from a single file.
    pub fn load_path(path: &Path) -> Result<Self, ManifestError> {
        let files = if path.is_dir() {
            collect_manifest_files(path)
                .map_err(|e| ManifestError::PathInvalid(format!("{}: {e}", path.display())))?
        } else if path.is_file() {
            vec![path.to_path_buf()]
        } else {
            return Err(ManifestError::PathInvalid(format!(
                "`{}` is neither a file nor a directory",
                path.display()
            )));
        };

        let mut documents = Vec::with_capacity(files.len());
        for file in &files {
            let text = std::fs::read_to_string(file)
                .map_err(|e| ManifestError::PathInvalid(format!("{}: {e}", file.display())))?;
            documents.push(text);
        }
        Self::load_strs(documents.iter().map(String::as_str))
    }

    /// Loads manifests from in-memory JSON strings, the surface tests use
    /// in place of a directory of files (§4.9).
    pub fn load_strs<'a>(documents: impl IntoIterator<Item = &'a str>) -> Result<Self, ManifestError> {
        let mut all_capabilities = Vec::new();
        for doc in documents {
            let value: serde_json::Value =
                serde_json::from_str(doc).map_err(|e| ManifestError::ParseFailure(e.to_string()))?;
            all_capabilities.extend(parse_capabilities(&value)?);
        }
        Ok(Self {
            capabilities: merge_capabilities(all_capabilities),
        })
    }

    /// Every capability name known to the store, across all loaded manifests.
    pub fn all_capability_ids(&self) -> Vec<CapabilityName> {
        self.capabilities.keys().cloned().collect()
    }

    /// Resolves a set of capability IDs to their merged per-gateway
    /// configuration. Unknown IDs contribute nothing (§4.9).
    pub fn configs_for(&self, ids: &[CapabilityName]) -> GatewayConfiguration {
        configs_for(&self.capabilities, ids)
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

fn collect_manifest_files(dir: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current)?.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().and_then(|e| e.to_str()) == Some("json") {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
