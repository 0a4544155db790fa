//! Record decoding and classification.
//!
//! A complete line is one JSON object. Each known top-level kind key
//! (`DevSts`, `ZbNet`, `DevFw`, `DevRtc`) yields one typed [`Record`];
//! unknown keys are ignored. A kind whose body does not fit its record type
//! is reported in [`DecodedLine::rejected`] without affecting the others.
//! `ZbNet` entries are decoded one by one: a malformed entry is rejected and
//! the rest of the list is kept.

use gw_types::lenient;
use gw_types::{ClockInfo, DeviceStatus, FirmwareInfo, NetworkTopology, TopologyEntry};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::DecodeError;

/// Epoch assigned when the line carries no `Epoch` field.
pub const EPOCH_ABSENT: i64 = 0;

/// Epoch assigned when `Epoch` is present but not an integer.
pub const EPOCH_ERROR: i64 = -1;

const EPOCH_KEY: &str = "Epoch";

const DEVICES_KEY: &str = "Devices";

/// Kind of a decoded record, in processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// `DevSts`
    DeviceStatus,
    /// `ZbNet`
    NetworkTopology,
    /// `DevFw`
    FirmwareInfo,
    /// `DevRtc`
    ClockInfo,
}

impl RecordKind {
    /// All kinds, in the order they are emitted.
    pub const ALL: [RecordKind; 4] = [
        RecordKind::DeviceStatus,
        RecordKind::NetworkTopology,
        RecordKind::FirmwareInfo,
        RecordKind::ClockInfo,
    ];

    /// Top-level key of this kind.
    pub fn key(self) -> &'static str {
        match self {
            RecordKind::DeviceStatus => "DevSts",
            RecordKind::NetworkTopology => "ZbNet",
            RecordKind::FirmwareInfo => "DevFw",
            RecordKind::ClockInfo => "DevRtc",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// A classified record body.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// Status of one device
    DeviceStatus(DeviceStatus),
    /// Mesh topology, one entry per device
    NetworkTopology(NetworkTopology),
    /// Controller firmware
    FirmwareInfo(FirmwareInfo),
    /// Controller clock
    ClockInfo(ClockInfo),
}

impl Record {
    /// Kind of this record.
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::DeviceStatus(_) => RecordKind::DeviceStatus,
            Record::NetworkTopology(_) => RecordKind::NetworkTopology,
            Record::FirmwareInfo(_) => RecordKind::FirmwareInfo,
            Record::ClockInfo(_) => RecordKind::ClockInfo,
        }
    }
}

/// A kind body that could not be mapped onto its record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    /// Kind that was rejected.
    pub kind: RecordKind,
    /// Why it was rejected.
    pub reason: String,
}

/// Result of decoding one line.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedLine {
    /// Epoch attached to every record of this line.
    pub epoch: i64,
    /// Records, in [`RecordKind::ALL`] order.
    pub records: Vec<Record>,
    /// Kinds that were present but malformed.
    pub rejected: Vec<RejectedRecord>,
}

impl DecodedLine {
    /// Whether the line produced neither records nor rejections.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.rejected.is_empty()
    }
}

/// Decode and classify a complete line.
pub fn decode(line: &str) -> Result<DecodedLine, DecodeError> {
    let document: Value = serde_json::from_str(line).map_err(DecodeError::Malformed)?;
    let Value::Object(mut object) = document else {
        return Err(DecodeError::NotAnObject);
    };

    let epoch = match object.get(EPOCH_KEY) {
        None => EPOCH_ABSENT,
        Some(value) => lenient::as_i64(value).unwrap_or(EPOCH_ERROR),
    };

    let mut decoded = DecodedLine {
        epoch,
        records: Vec::new(),
        rejected: Vec::new(),
    };

    for kind in RecordKind::ALL {
        let Some(body) = object.remove(kind.key()) else {
            continue;
        };
        let result = match kind {
            RecordKind::DeviceStatus => typed(body).map(Record::DeviceStatus),
            RecordKind::NetworkTopology => {
                topology(body, &mut decoded.rejected).map(Record::NetworkTopology)
            }
            RecordKind::FirmwareInfo => typed(body).map(Record::FirmwareInfo),
            RecordKind::ClockInfo => typed(body).map(Record::ClockInfo),
        };
        match result {
            Ok(record) => decoded.records.push(record),
            Err(reason) => decoded.rejected.push(RejectedRecord { kind, reason }),
        }
    }

    Ok(decoded)
}

fn typed<T: DeserializeOwned>(body: Value) -> Result<T, String> {
    if !body.is_object() {
        return Err(format!("expected an object, got {}", kind_of(&body)));
    }
    serde_json::from_value(body).map_err(|e| e.to_string())
}

/// Decode a `ZbNet` body entry by entry, rejecting bad entries individually.
fn topology(body: Value, rejected: &mut Vec<RejectedRecord>) -> Result<NetworkTopology, String> {
    let Value::Object(mut body) = body else {
        return Err(format!("expected an object, got {}", kind_of(&body)));
    };
    let entries = match body.remove(DEVICES_KEY) {
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            return Err(format!("{DEVICES_KEY}: expected an array, got {}", kind_of(&other)))
        }
        None => return Err(format!("missing field `{DEVICES_KEY}`")),
    };

    let mut devices = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match typed::<TopologyEntry>(entry) {
            Ok(device) => devices.push(device),
            Err(reason) => rejected.push(RejectedRecord {
                kind: RecordKind::NetworkTopology,
                reason: format!("{DEVICES_KEY}[{index}]: {reason}"),
            }),
        }
    }
    Ok(NetworkTopology { devices })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
