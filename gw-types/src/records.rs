//! Inbound records emitted by the sensor network controller.
//!
//! Each complete line from the controller is a JSON object wrapping one or
//! more of these bodies under a kind key (`DevSts`, `ZbNet`, `DevFw`,
//! `DevRtc`). Field names follow the controller firmware.

use serde::{Deserialize, Serialize};

use crate::lenient;

/// Battery sub-record of a device status report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Battery {
    /// Battery voltage
    #[serde(deserialize_with = "lenient::f64_value")]
    pub voltage: f64,
    /// Charge level
    #[serde(deserialize_with = "lenient::i64_value")]
    pub level: i64,
    /// Charging state code (-1 = unknown)
    #[serde(deserialize_with = "lenient::i64_value")]
    pub state: i64,
}

impl Default for Battery {
    fn default() -> Self {
        Self {
            voltage: 0.0,
            level: 0,
            state: -1,
        }
    }
}

/// Body of a `DevSts` record: status of a single device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// Declared device UID
    #[serde(
        rename = "UID",
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub uid: Option<String>,
    /// Transport address
    #[serde(
        rename = "ZbAddr",
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub address: Option<String>,
    /// Parent transport address
    #[serde(
        rename = "ZbPrntAddr",
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent: Option<String>,
    /// Raw temperature in tenths of a degree
    #[serde(
        rename = "Temperature",
        default,
        deserialize_with = "lenient::opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub temperature: Option<f64>,
    /// Connectivity / battery-mode indicator
    #[serde(
        rename = "CbM",
        default,
        deserialize_with = "lenient::opt_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub connectivity: Option<i64>,
    /// Battery sub-record
    #[serde(
        rename = "Battery",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub battery: Option<Battery>,
}

/// One device entry inside a `ZbNet` record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyEntry {
    /// Declared device UID
    #[serde(
        rename = "UID",
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub uid: Option<String>,
    /// Transport address
    #[serde(
        rename = "ZbAddr",
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub address: Option<String>,
    /// Parent transport address
    #[serde(
        rename = "ZbPrntAddr",
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent: Option<String>,
    /// Device type code
    #[serde(
        rename = "ZbTyp",
        default,
        deserialize_with = "lenient::opt_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub device_type: Option<i64>,
    /// Network state code
    #[serde(
        rename = "ZbSts",
        default,
        deserialize_with = "lenient::opt_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub network_state: Option<i64>,
    /// Signal strength
    #[serde(
        rename = "RSSI",
        default,
        deserialize_with = "lenient::opt_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub rssi: Option<i64>,
}

/// Body of a `ZbNet` record: the controller's view of the mesh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkTopology {
    /// One entry per device known to the controller
    #[serde(rename = "Devices")]
    pub devices: Vec<TopologyEntry>,
}

/// Body of a `DevFw` record: controller firmware.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FirmwareInfo {
    /// Firmware name
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub name: Option<String>,
    /// Firmware version
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub version: Option<String>,
    /// Build date
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub date: Option<String>,
}

/// Body of a `DevRtc` record: controller clock.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClockInfo {
    /// Current date
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub date: Option<String>,
    /// Current time
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub time: Option<String>,
}
