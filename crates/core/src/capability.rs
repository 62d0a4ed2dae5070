// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capability and Manifest data model (§3, §4.9).
//!
//! Parsing here is deliberately manual rather than derive-based: §3/§4.9
//! distinguishes six distinct schema-violation cases (missing `capabilities`
//! array, non-object capability, missing `name`, missing `gateways` array,
//! missing gateway `id`, missing or non-array gateway `config`) and each
//! needs its own `ManifestError::SchemaViolation` message.

use crate::error::ManifestError;
use crate::ids::CapabilityName;
use serde_json::Value;
use std::collections::HashMap;

/// A capability as parsed from one manifest, before merging with any other
/// manifest that defines a capability of the same name.
#[derive(Debug, Clone, PartialEq)]
pub struct Capability {
    pub name: CapabilityName,
    /// Gateway ID -> config fragments, in the order encountered.
    pub gateways: HashMap<String, Vec<Value>>,
}

/// A mapping from gateway ID to an array of JSON fragments, produced by
/// selecting a set of capabilities (§4.9's `configs_for`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GatewayConfiguration(pub HashMap<String, Vec<Value>>);

impl GatewayConfiguration {
    pub fn fragments_for(&self, gateway_id: &str) -> &[Value] {
        self.0.get(gateway_id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn extend(&mut self, gateway_id: &str, fragments: &[Value]) {
        self.0
            .entry(gateway_id.to_string())
            .or_default()
            .extend(fragments.iter().cloned());
    }
}

/// Parses one manifest document's `capabilities` array. Parse errors are
/// terminal for the whole document: the first violation aborts parsing.
pub fn parse_capabilities(document: &Value) -> Result<Vec<Capability>, ManifestError> {
    let capabilities = document
        .get("capabilities")
        .and_then(Value::as_array)
        .ok_or_else(|| ManifestError::SchemaViolation {
            field: "capabilities".to_string(),
            detail: "must be present and an array".to_string(),
        })?;

    capabilities
        .iter()
        .map(parse_one_capability)
        .collect::<Result<Vec<_>, _>>()
}

fn parse_one_capability(entry: &Value) -> Result<Capability, ManifestError> {
    let obj = entry.as_object().ok_or_else(|| ManifestError::SchemaViolation {
        field: "capabilities[]".to_string(),
        detail: "each capability must be a JSON object".to_string(),
    })?;

    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| ManifestError::SchemaViolation {
            field: "capabilities[].name".to_string(),
            detail: "missing or not a string".to_string(),
        })?;

    let gateways_array = obj
        .get("gateways")
        .and_then(Value::as_array)
        .ok_or_else(|| ManifestError::SchemaViolation {
            field: "capabilities[].gateways".to_string(),
            detail: "missing or not an array".to_string(),
        })?;

    let mut gateways: HashMap<String, Vec<Value>> = HashMap::new();
    for gw in gateways_array {
        let gw_obj = gw.as_object().ok_or_else(|| ManifestError::SchemaViolation {
            field: "capabilities[].gateways[]".to_string(),
            detail: "each gateway entry must be a JSON object".to_string(),
        })?;

        let id = gw_obj
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ManifestError::SchemaViolation {
                field: "capabilities[].gateways[].id".to_string(),
                detail: "missing or not a string".to_string(),
            })?;

        let config = gw_obj
            .get("config")
            .and_then(Value::as_array)
            .ok_or_else(|| ManifestError::SchemaViolation {
                field: "capabilities[].gateways[].config".to_string(),
                detail: "missing or not an array".to_string(),
            })?;

        gateways
            .entry(id.to_string())
            .or_default()
            .extend(config.iter().cloned());
    }

    Ok(Capability {
        name: CapabilityName::new(name),
        gateways,
    })
}

/// Merges capabilities across manifests: capabilities sharing a name have
/// their per-gateway config arrays concatenated in load order (§4.9,
/// property P7). See `DESIGN.md` for why concatenation was chosen over
/// keeping only the first manifest's definition.
pub fn merge_capabilities(
    capabilities: impl IntoIterator<Item = Capability>,
) -> HashMap<CapabilityName, Capability> {
    let mut merged: HashMap<CapabilityName, Capability> = HashMap::new();
    for cap in capabilities {
        match merged.get_mut(&cap.name) {
            None => {
                merged.insert(cap.name.clone(), cap);
            }
            Some(existing) => {
                for (gateway_id, fragments) in &cap.gateways {
                    existing.extend_gateway(gateway_id, fragments);
                }
            }
        }
    }
    merged
}

impl Capability {
    fn extend_gateway(&mut self, gateway_id: &str, fragments: &[Value]) {
        self.gateways
            .entry(gateway_id.to_string())
            .or_default()
            .extend(fragments.iter().cloned());
    }
}

/// Selects a `GatewayConfiguration` for the given capability IDs. Unknown
/// IDs are ignored (contribute nothing), per §4.9.
pub fn configs_for(
    capabilities: &HashMap<CapabilityName, Capability>,
    ids: &[CapabilityName],
) -> GatewayConfiguration {
    let mut out = GatewayConfiguration::default();
    for id in ids {
        if let Some(cap) = capabilities.get(id) {
            for (gateway_id, fragments) in &cap.gateways {
                out.extend(gateway_id, fragments);
            }
        }
    }
    out
}

#[cfg(test)]
#[path = "capability_tests.rs"]
mod tests;
