//! Network configuration document (the configuration pool).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::WireError;

/// Credentials and template reference used to provision a device.
///
/// Absent fields decode as empty; [`ProvisioningProfile::missing_fields`]
/// reports them so provisioning can fail for this device alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningProfile {
    /// Identity service scope
    pub id_scope: String,
    /// Device id registered with the identity service
    pub device_id: String,
    /// Shared access key
    pub primary_key: String,
    /// Device template reference
    pub device_template_id: String,
    /// Physical identifier used to tag relayed messages
    pub device_physical_id: String,
}

impl ProvisioningProfile {
    /// Names of the fields that are empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("id_scope", &self.id_scope),
            ("device_id", &self.device_id),
            ("primary_key", &self.primary_key),
            ("device_template_id", &self.device_template_id),
            ("device_physical_id", &self.device_physical_id),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    /// Whether every field is set.
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

/// One entry of the configuration pool, keyed by UID or placeholder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PoolEntry {
    /// Configured display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Provisioning profile, if the device should be provisioned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning: Option<ProvisioningProfile>,
}

impl PoolEntry {
    /// Physical identifier from the provisioning profile, if any.
    pub fn physical_id(&self) -> Option<&str> {
        self.provisioning
            .as_ref()
            .map(|p| p.device_physical_id.as_str())
    }
}

/// The network configuration document.
///
/// Only `Nodes` is interpreted; the other sections are carried through
/// untouched. Nodes are decoded one by one: a node that does not fit
/// [`PoolEntry`] is left out and listed in `rejected_nodes`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", from = "RawNetConfig")]
pub struct NetConfig {
    /// Default provisioning settings
    pub default_provisioning: Value,
    /// Gateway-level settings
    pub edge_gateway: Value,
    /// Pool entries keyed by UID or placeholder key
    pub nodes: BTreeMap<String, PoolEntry>,
    /// Site map
    pub map: Value,
    /// Nodes left out, with the decode error of each
    #[serde(skip)]
    pub rejected_nodes: BTreeMap<String, String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawNetConfig {
    #[serde(default)]
    default_provisioning: Value,
    #[serde(default)]
    edge_gateway: Value,
    #[serde(default)]
    nodes: BTreeMap<String, Value>,
    #[serde(default)]
    map: Value,
}

impl From<RawNetConfig> for NetConfig {
    fn from(raw: RawNetConfig) -> Self {
        let mut nodes = BTreeMap::new();
        let mut rejected_nodes = BTreeMap::new();
        for (key, node) in raw.nodes {
            match serde_json::from_value::<PoolEntry>(node) {
                Ok(entry) => {
                    nodes.insert(key, entry);
                }
                Err(e) => {
                    rejected_nodes.insert(key, e.to_string());
                }
            }
        }
        Self {
            default_provisioning: raw.default_provisioning,
            edge_gateway: raw.edge_gateway,
            nodes,
            map: raw.map,
            rejected_nodes,
        }
    }
}

impl NetConfig {
    /// Parse the document from JSON.
    pub fn from_json(json: &str) -> Result<Self, WireError> {
        serde_json::from_str(json).map_err(WireError::Deserialization)
    }

    /// Serialize the document to pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, WireError> {
        serde_json::to_string_pretty(self).map_err(WireError::Serialization)
    }
}
