//! Minimal device change relayed onward.

use serde::{Deserialize, Serialize};

use crate::{Battery, Uid, WireError};

/// The fields of a device touched by one record, or a full device snapshot.
///
/// `UID`, `Epoch`, `Address` and `Parent` are always present. Every other
/// field is present only when the producing record carried it (or, for a
/// snapshot, always).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaRecord {
    /// Display name (snapshot only)
    #[serde(rename = "Name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Sequence id (snapshot only)
    #[serde(rename = "Id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    /// Device type code
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<i64>,
    /// Device UID
    #[serde(rename = "UID")]
    pub uid: String,
    /// Epoch of the record that produced this change
    #[serde(rename = "Epoch")]
    pub epoch: i64,
    /// Network state code
    #[serde(rename = "State", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<i64>,
    /// Transport address after the change
    #[serde(rename = "Address")]
    pub address: String,
    /// Parent address after the change
    #[serde(rename = "Parent")]
    pub parent: String,
    /// Signal strength
    #[serde(rename = "RSSI", default, skip_serializing_if = "Option::is_none")]
    pub rssi: Option<i64>,
    /// Temperature in degrees
    #[serde(
        rename = "Temperature",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub temperature: Option<f64>,
    /// Connectivity / battery-mode indicator
    #[serde(rename = "CbM", default, skip_serializing_if = "Option::is_none")]
    pub connectivity: Option<i64>,
    /// Battery sub-record
    #[serde(rename = "Battery", default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<Battery>,
    /// Provisioning status code (snapshot only)
    #[serde(
        rename = "Provisioned",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub provisioned: Option<i8>,
}

impl DeltaRecord {
    /// Create a delta holding only the base fields.
    pub fn base(uid: &Uid, epoch: i64, address: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            name: None,
            id: None,
            device_type: None,
            uid: uid.to_string(),
            epoch,
            state: None,
            address: address.into(),
            parent: parent.into(),
            rssi: None,
            temperature: None,
            connectivity: None,
            battery: None,
            provisioned: None,
        }
    }

    /// Wire names of the fields present in this delta, in serialization order.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.name.is_some() {
            names.push("Name");
        }
        if self.id.is_some() {
            names.push("Id");
        }
        if self.device_type.is_some() {
            names.push("Type");
        }
        names.push("UID");
        names.push("Epoch");
        if self.state.is_some() {
            names.push("State");
        }
        names.push("Address");
        names.push("Parent");
        if self.rssi.is_some() {
            names.push("RSSI");
        }
        if self.temperature.is_some() {
            names.push("Temperature");
        }
        if self.connectivity.is_some() {
            names.push("CbM");
        }
        if self.battery.is_some() {
            names.push("Battery");
        }
        if self.provisioned.is_some() {
            names.push("Provisioned");
        }
        names
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String, WireError> {
        serde_json::to_string(self).map_err(WireError::Serialization)
    }

    /// Deserialize from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, WireError> {
        serde_json::from_str(json).map_err(WireError::Deserialization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid() -> Uid {
        Uid::parse("AABBCCDD").unwrap()
    }

    #[test]
    fn base_delta_has_four_fields() {
        let delta = DeltaRecord::base(&uid(), 7, "1234", "-");
        assert_eq!(delta.field_names(), vec!["UID", "Epoch", "Address", "Parent"]);

        let value: serde_json::Value = serde_json::from_str(&delta.to_json().unwrap()).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 4);
        assert_eq!(object["UID"], "AABBCCDD");
        assert_eq!(object["Epoch"], 7);
        assert_eq!(object["Address"], "1234");
        assert_eq!(object["Parent"], "-");
    }

    #[test]
    fn optional_fields_appear_only_when_set() {
        let mut delta = DeltaRecord::base(&uid(), 1, "1234", "0000");
        delta.temperature = Some(21.5);
        delta.battery = Some(Battery::default());

        assert_eq!(
            delta.field_names(),
            vec!["UID", "Epoch", "Address", "Parent", "Temperature", "Battery"]
        );
        let json = delta.to_json().unwrap();
        assert!(json.contains("\"Temperature\":21.5"));
        assert!(!json.contains("RSSI"));
        assert!(!json.contains("Provisioned"));
    }

    #[test]
    fn parses_relayed_body() {
        let delta = DeltaRecord::from_json(
            r#"{"UID":"AABBCCDD","Epoch":3,"Address":"1234","Parent":"-","RSSI":-70}"#,
        )
        .unwrap();
        assert_eq!(delta.rssi, Some(-70));
        assert!(delta.temperature.is_none());
    }
}
