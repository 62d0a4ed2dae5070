// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parsed configuration-fragment shapes for the concrete gateways
//! (§4.4–§4.8). Each type deserializes directly from one JSON fragment out of
//! a capability's `gateways[].config[]` array.

use serde::{Deserialize, Serialize};

/// One Network gateway configuration entry (§4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkEntry {
    pub direction: NetworkDirection,
    #[serde(default)]
    pub allow: Vec<NetworkRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NetworkDirection {
    Incoming,
    Outgoing,
}

impl NetworkDirection {
    /// The iptables chain this direction writes rules into.
    pub fn chain(&self) -> &'static str {
        match self {
            NetworkDirection::Incoming => "INPUT",
            NetworkDirection::Outgoing => "OUTPUT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRule {
    pub host: String,
    #[serde(default)]
    pub ports: Option<PortSpec>,
    #[serde(default)]
    pub protocols: Option<ProtocolSpec>,
}

/// A single port, a `"lo:hi"` range, or an explicit list of ports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortSpec {
    Single(u16),
    Range(String),
    List(Vec<u16>),
}

/// A single protocol name or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProtocolSpec {
    Single(Protocol),
    List(Vec<Protocol>),
}

impl ProtocolSpec {
    pub fn as_vec(&self) -> Vec<Protocol> {
        match self {
            ProtocolSpec::Single(p) => vec![*p],
            ProtocolSpec::List(ps) => ps.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
        }
    }
}

/// One Cgroups gateway configuration entry (§4.5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CgroupSetting {
    pub setting: String,
    pub value: String,
}

/// One DeviceNode gateway configuration entry (§4.6). `mode` is the
/// owner/group/other octal triple (each digit 0-7); absent means "mount
/// with the driver's default mode".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceNodeConfig {
    pub name: String,
    #[serde(default)]
    pub mode: Option<DeviceMode>,
}

/// An octal permission triple, stored as three independent digits so the
/// digit-wise union (§4.6, property P4) never has to re-derive them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceMode {
    pub owner: u8,
    pub group: u8,
    pub other: u8,
}

impl DeviceMode {
    pub fn new(owner: u8, group: u8, other: u8) -> Option<Self> {
        if owner > 7 || group > 7 || other > 7 {
            None
        } else {
            Some(Self {
                owner,
                group,
                other,
            })
        }
    }

    /// Digit-wise max union, e.g. `622 ∪ 755 -> 755`, `444 ∪ 266 -> 466`.
    pub fn union(&self, other: &DeviceMode) -> DeviceMode {
        DeviceMode {
            owner: self.owner.max(other.owner),
            group: self.group.max(other.group),
            other: self.other.max(other.other),
        }
    }
}

impl TryFrom<String> for DeviceMode {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let digits: Vec<u8> = s
            .chars()
            .map(|c| c.to_digit(8).map(|d| d as u8))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| format!("`{s}` is not a 3-digit octal mode"))?;
        match digits.as_slice() {
            [owner, group, other] => Ok(DeviceMode {
                owner: *owner,
                group: *group,
                other: *other,
            }),
            _ => Err(format!("`{s}` is not a 3-digit octal mode")),
        }
    }
}

impl From<DeviceMode> for String {
    fn from(m: DeviceMode) -> Self {
        format!("{}{}{}", m.owner, m.group, m.other)
    }
}

/// Mode for an Environment gateway entry (§4.7). Deserialized
/// case-insensitively; unknown values must be rejected, not defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvMode {
    #[default]
    Set,
    Append,
    Prepend,
}

impl EnvMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "set" => Some(EnvMode::Set),
            "append" => Some(EnvMode::Append),
            "prepend" => Some(EnvMode::Prepend),
            _ => None,
        }
    }
}

/// Routed through `EnvMode::parse` rather than a derived enum
/// deserializer, so `"Append"`/`"SET"`/etc. are accepted per §4.7's
/// case-insensitive requirement instead of only the literal lowercase
/// variant names.
impl<'de> Deserialize<'de> for EnvMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        EnvMode::parse(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "`{s}` is not a valid environment mode (expected set, append, or prepend)"
            ))
        })
    }
}

/// One Environment gateway configuration entry (§4.7).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvEntry {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub mode: EnvMode,
    #[serde(default)]
    pub separator: String,
}

/// D-Bus gateway configuration (§4.8). Each array holds opaque rule
/// objects passed through verbatim to the external proxy process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DBusConfig {
    #[serde(
        rename = "dbus-gateway-config-session",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub session: Vec<serde_json::Value>,
    #[serde(
        rename = "dbus-gateway-config-system",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub system: Vec<serde_json::Value>,
}

impl DBusConfig {
    pub fn is_empty(&self) -> bool {
        self.session.is_empty() && self.system.is_empty()
    }
}

#[cfg(test)]
#[path = "gateway_config_tests.rs"]
mod tests;
