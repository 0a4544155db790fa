//! Device registry: the authoritative map of known devices.
//!
//! Devices are created from the first status or topology record that names
//! a new UID and updated in place afterwards. Every update returns a
//! [`DeltaRecord`] holding the base fields plus whatever the record carried.

use std::collections::HashMap;

use gw_types::{Battery, DeltaRecord, DeviceStatus, TopologyEntry, Uid};
use serde::Serialize;

use crate::{ProvisioningStatus, RecordError};

/// Address and parent value meaning "not set".
pub const UNSET_ADDRESS: &str = "-";

/// A known sensor node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Id")]
    id: u32,
    #[serde(rename = "Type")]
    device_type: i64,
    #[serde(rename = "UID")]
    uid: Uid,
    #[serde(rename = "Epoch")]
    epoch: i64,
    #[serde(rename = "State")]
    state: i64,
    #[serde(rename = "Address")]
    address: String,
    #[serde(rename = "Parent")]
    parent: String,
    #[serde(rename = "RSSI")]
    rssi: i64,
    #[serde(rename = "Temperature")]
    temperature: f64,
    #[serde(rename = "CbM")]
    connectivity: i64,
    #[serde(rename = "Battery")]
    battery: Battery,
    #[serde(rename = "Provisioned")]
    provisioning: ProvisioningStatus,
}

impl Device {
    fn blank(uid: Uid, id: u32, name: String) -> Self {
        Self {
            name,
            id,
            device_type: -1,
            uid,
            epoch: -1,
            state: -1,
            address: UNSET_ADDRESS.to_string(),
            parent: UNSET_ADDRESS.to_string(),
            rssi: 0,
            temperature: 0.0,
            connectivity: -1,
            battery: Battery::default(),
            provisioning: ProvisioningStatus::Unprovisioned,
        }
    }

    fn located(
        uid: Uid,
        id: u32,
        epoch: i64,
        name: String,
        address: Option<&str>,
        parent: Option<&str>,
    ) -> Result<Self, RecordError> {
        let address = address.ok_or_else(|| RecordError::MissingAddress {
            uid: uid.to_string(),
        })?;
        let mut device = Self::blank(uid, id, name);
        device.epoch = epoch;
        device.address = address.to_uppercase();
        if let Some(parent) = parent {
            device.parent = parent.to_string();
        }
        Ok(device)
    }

    /// Create a device from a status record.
    ///
    /// The record must carry an address.
    pub fn from_status(
        uid: Uid,
        status: &DeviceStatus,
        id: u32,
        epoch: i64,
        name: String,
    ) -> Result<Self, RecordError> {
        let mut device = Self::located(
            uid,
            id,
            epoch,
            name,
            status.address.as_deref(),
            status.parent.as_deref(),
        )?;
        if let Some(raw) = status.temperature {
            device.temperature = raw / 10.0;
        }
        if let Some(connectivity) = status.connectivity {
            device.connectivity = connectivity;
        }
        if let Some(battery) = &status.battery {
            device.battery = battery.clone();
        }
        Ok(device)
    }

    /// Create a device from a topology entry.
    ///
    /// The entry must carry an address.
    pub fn from_topology(
        uid: Uid,
        entry: &TopologyEntry,
        id: u32,
        epoch: i64,
        name: String,
    ) -> Result<Self, RecordError> {
        let mut device = Self::located(
            uid,
            id,
            epoch,
            name,
            entry.address.as_deref(),
            entry.parent.as_deref(),
        )?;
        if let Some(device_type) = entry.device_type {
            device.device_type = device_type;
        }
        if let Some(state) = entry.network_state {
            device.state = state;
        }
        if let Some(rssi) = entry.rssi {
            device.rssi = rssi;
        }
        Ok(device)
    }

    // Common part of both updates: identity check, epoch, address and parent.
    fn relocate(
        &mut self,
        declared_uid: Option<&str>,
        address: Option<&str>,
        parent: Option<&str>,
        epoch: i64,
    ) -> Result<(), RecordError> {
        if let Some(found) = declared_uid {
            if found != self.uid.as_str() {
                return Err(RecordError::IdentityMismatch {
                    expected: self.uid.to_string(),
                    found: found.to_string(),
                });
            }
        }

        self.epoch = epoch;

        if let Some(address) = address {
            let address = address.to_uppercase();
            if address != self.address {
                self.address = address;
                self.parent = UNSET_ADDRESS.to_string();
            }
        }
        if let Some(parent) = parent {
            self.parent = parent.to_string();
        }
        Ok(())
    }

    fn base_delta(&self) -> DeltaRecord {
        DeltaRecord::base(&self.uid, self.epoch, &self.address, &self.parent)
    }

    /// Merge a status record and return the change.
    ///
    /// A record naming another UID is rejected and the device is untouched.
    pub fn apply_status(
        &mut self,
        status: &DeviceStatus,
        epoch: i64,
    ) -> Result<DeltaRecord, RecordError> {
        self.relocate(
            status.uid.as_deref(),
            status.address.as_deref(),
            status.parent.as_deref(),
            epoch,
        )?;

        let mut delta = self.base_delta();
        if let Some(raw) = status.temperature {
            self.temperature = raw / 10.0;
            delta.temperature = Some(self.temperature);
        }
        if let Some(connectivity) = status.connectivity {
            self.connectivity = connectivity;
            delta.connectivity = Some(connectivity);
        }
        if let Some(battery) = &status.battery {
            self.battery = battery.clone();
            delta.battery = Some(battery.clone());
        }
        Ok(delta)
    }

    /// Merge a topology entry and return the change.
    ///
    /// An entry naming another UID is rejected and the device is untouched.
    pub fn apply_topology(
        &mut self,
        entry: &TopologyEntry,
        epoch: i64,
    ) -> Result<DeltaRecord, RecordError> {
        self.relocate(
            entry.uid.as_deref(),
            entry.address.as_deref(),
            entry.parent.as_deref(),
            epoch,
        )?;

        let mut delta = self.base_delta();
        if let Some(device_type) = entry.device_type {
            self.device_type = device_type;
            delta.device_type = Some(device_type);
        }
        if let Some(state) = entry.network_state {
            self.state = state;
            delta.state = Some(state);
        }
        if let Some(rssi) = entry.rssi {
            self.rssi = rssi;
            delta.rssi = Some(rssi);
        }
        Ok(delta)
    }

    /// Full view of the device as a delta with every field set.
    pub fn snapshot(&self) -> DeltaRecord {
        let mut delta = self.base_delta();
        delta.name = Some(self.name.clone());
        delta.id = Some(self.id);
        delta.device_type = Some(self.device_type);
        delta.state = Some(self.state);
        delta.rssi = Some(self.rssi);
        delta.temperature = Some(self.temperature);
        delta.connectivity = Some(self.connectivity);
        delta.battery = Some(self.battery.clone());
        delta.provisioned = Some(self.provisioning.code());
        delta
    }

    /// Record the outcome of a provisioning attempt.
    pub fn commit_provisioning(&mut self, succeeded: bool) -> ProvisioningStatus {
        self.provisioning = self.provisioning.on_outcome(succeeded);
        self.provisioning
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sequence id assigned at creation.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Device UID.
    pub fn uid(&self) -> &Uid {
        &self.uid
    }

    /// Device type code (-1 = unknown).
    pub fn device_type(&self) -> i64 {
        self.device_type
    }

    /// Epoch of the last record (-1 = never).
    pub fn epoch(&self) -> i64 {
        self.epoch
    }

    /// Network state code (-1 = unknown).
    pub fn state(&self) -> i64 {
        self.state
    }

    /// Transport address, upper case.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Parent transport address ([`UNSET_ADDRESS`] = none).
    pub fn parent(&self) -> &str {
        &self.parent
    }

    /// Signal strength.
    pub fn rssi(&self) -> i64 {
        self.rssi
    }

    /// Temperature in degrees.
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Connectivity / battery-mode indicator.
    pub fn connectivity(&self) -> i64 {
        self.connectivity
    }

    /// Battery sub-record.
    pub fn battery(&self) -> &Battery {
        &self.battery
    }

    /// Provisioning status.
    pub fn provisioning(&self) -> ProvisioningStatus {
        self.provisioning
    }
}

/// A record body that creates or updates one device.
pub trait DeviceRecord {
    /// UID carried by the record, if any.
    fn declared_uid(&self) -> Option<&str>;

    /// Transport address carried by the record, if any.
    fn declared_address(&self) -> Option<&str>;

    /// Build a new device from this record.
    fn create(&self, uid: Uid, id: u32, epoch: i64, name: String) -> Result<Device, RecordError>;

    /// Merge this record into an existing device.
    fn update(&self, device: &mut Device, epoch: i64) -> Result<DeltaRecord, RecordError>;
}

impl DeviceRecord for DeviceStatus {
    fn declared_uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    fn declared_address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    fn create(&self, uid: Uid, id: u32, epoch: i64, name: String) -> Result<Device, RecordError> {
        Device::from_status(uid, self, id, epoch, name)
    }

    fn update(&self, device: &mut Device, epoch: i64) -> Result<DeltaRecord, RecordError> {
        device.apply_status(self, epoch)
    }
}

impl DeviceRecord for TopologyEntry {
    fn declared_uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    fn declared_address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    fn create(&self, uid: Uid, id: u32, epoch: i64, name: String) -> Result<Device, RecordError> {
        Device::from_topology(uid, self, id, epoch, name)
    }

    fn update(&self, device: &mut Device, epoch: i64) -> Result<DeltaRecord, RecordError> {
        device.apply_topology(self, epoch)
    }
}

/// In-memory map of known devices, keyed by UID.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: HashMap<Uid, Device>,
}

impl DeviceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a device by UID.
    pub fn get(&self, uid: &str) -> Option<&Device> {
        self.devices.get(uid)
    }

    /// Look up a device by UID for mutation.
    pub fn get_mut(&mut self, uid: &str) -> Option<&mut Device> {
        self.devices.get_mut(uid)
    }

    /// Find a device by transport address, ignoring case.
    pub fn find_by_address(&self, address: &str) -> Option<&Device> {
        if address.is_empty() || address == UNSET_ADDRESS {
            return None;
        }
        self.devices
            .values()
            .find(|device| device.address.eq_ignore_ascii_case(address))
    }

    /// Number of devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// All devices, ordered by sequence id.
    pub fn devices(&self) -> Vec<&Device> {
        let mut devices: Vec<_> = self.devices.values().collect();
        devices.sort_by_key(|device| device.id);
        devices
    }

    /// Sequence id the next created device receives.
    pub fn next_sequence_id(&self) -> u32 {
        u32::try_from(self.devices.len()).unwrap_or(u32::MAX)
    }

    /// Create a device from a record and register it.
    pub fn create<R: DeviceRecord + ?Sized>(
        &mut self,
        record: &R,
        uid: Uid,
        epoch: i64,
        name: String,
    ) -> Result<&Device, RecordError> {
        if self.devices.contains_key(&uid) {
            return Err(RecordError::DuplicateIdentity {
                uid: uid.to_string(),
            });
        }
        let device = record.create(uid.clone(), self.next_sequence_id(), epoch, name)?;
        Ok(self.devices.entry(uid).or_insert(device))
    }

    /// Merge a record into a registered device.
    pub fn update<R: DeviceRecord + ?Sized>(
        &mut self,
        uid: &str,
        record: &R,
        epoch: i64,
    ) -> Result<DeltaRecord, RecordError> {
        let device = self
            .devices
            .get_mut(uid)
            .ok_or_else(|| RecordError::UnknownDevice {
                uid: uid.to_string(),
            })?;
        record.update(device, epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(s: &str) -> Uid {
        Uid::parse(s).unwrap()
    }

    fn status(json: serde_json::Value) -> DeviceStatus {
        serde_json::from_value(json).unwrap()
    }

    fn topology(json: serde_json::Value) -> TopologyEntry {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn create_from_status_applies_defaults_and_overlays() {
        let record = status(serde_json::json!({
            "UID": "AABBCCDD", "ZbAddr": "1a2b", "Temperature": 215, "CbM": 1
        }));
        let device = Device::from_status(uid("AABBCCDD"), &record, 0, 5, "NodeDD".into()).unwrap();

        assert_eq!(device.address(), "1A2B");
        assert_eq!(device.parent(), UNSET_ADDRESS);
        assert_eq!(device.temperature(), 21.5);
        assert_eq!(device.connectivity(), 1);
        assert_eq!(device.epoch(), 5);
        assert_eq!(device.device_type(), -1);
        assert_eq!(device.state(), -1);
        assert_eq!(device.rssi(), 0);
        assert_eq!(device.battery(), &Battery::default());
        assert_eq!(device.provisioning(), ProvisioningStatus::Unprovisioned);
    }

    #[test]
    fn create_from_topology_overlays_network_fields() {
        let record = topology(serde_json::json!({
            "UID": "AABBCCDD", "ZbAddr": "1234", "ZbPrntAddr": "0000",
            "ZbTyp": 2, "ZbSts": 1, "RSSI": -61
        }));
        let device = Device::from_topology(uid("AABBCCDD"), &record, 3, 0, "x".into()).unwrap();
        assert_eq!(device.id(), 3);
        assert_eq!(device.parent(), "0000");
        assert_eq!(device.device_type(), 2);
        assert_eq!(device.state(), 1);
        assert_eq!(device.rssi(), -61);
        assert_eq!(device.temperature(), 0.0);
        assert_eq!(device.connectivity(), -1);
    }

    #[test]
    fn create_without_address_fails() {
        let record = status(serde_json::json!({"UID": "AABBCCDD", "Temperature": 100}));
        let err = Device::from_status(uid("AABBCCDD"), &record, 0, 0, "x".into()).unwrap_err();
        assert_eq!(
            err,
            RecordError::MissingAddress {
                uid: "AABBCCDD".into()
            }
        );
    }

    #[test]
    fn status_delta_has_base_plus_present_fields() {
        let mut registry = DeviceRegistry::new();
        let first = status(serde_json::json!({"UID": "AABBCCDD", "ZbAddr": "1234"}));
        registry.create(&first, uid("AABBCCDD"), 1, "n".into()).unwrap();

        let update = status(serde_json::json!({"UID": "AABBCCDD", "CbM": 0}));
        let delta = registry.update("AABBCCDD", &update, 2).unwrap();
        assert_eq!(delta.field_names(), vec!["UID", "Epoch", "Address", "Parent", "CbM"]);
        assert_eq!(delta.epoch, 2);
        assert_eq!(delta.address, "1234");

        let update = status(serde_json::json!({
            "Temperature": 190, "Battery": {"Voltage": 3.0, "Level": 90, "State": 1}
        }));
        let delta = registry.update("AABBCCDD", &update, 3).unwrap();
        assert_eq!(
            delta.field_names(),
            vec!["UID", "Epoch", "Address", "Parent", "Temperature", "Battery"]
        );
        assert_eq!(delta.temperature, Some(19.0));
    }

    #[test]
    fn topology_delta_has_network_fields() {
        let mut registry = DeviceRegistry::new();
        let first = topology(serde_json::json!({"UID": "AABBCCDD", "ZbAddr": "1234"}));
        registry.create(&first, uid("AABBCCDD"), 1, "n".into()).unwrap();

        let update = topology(serde_json::json!({"UID": "AABBCCDD", "RSSI": -50, "ZbSts": 2}));
        let delta = registry.update("AABBCCDD", &update, 2).unwrap();
        assert_eq!(
            delta.field_names(),
            vec!["UID", "Epoch", "State", "Address", "Parent", "RSSI"]
        );
        assert!(delta.device_type.is_none());
    }

    #[test]
    fn address_change_resets_parent() {
        let mut registry = DeviceRegistry::new();
        let first = status(serde_json::json!({"UID": "AABBCCDD", "ZbAddr": "1234", "ZbPrntAddr": "0000"}));
        registry.create(&first, uid("AABBCCDD"), 1, "n".into()).unwrap();

        let moved = status(serde_json::json!({"UID": "AABBCCDD", "ZbAddr": "abcd"}));
        let delta = registry.update("AABBCCDD", &moved, 2).unwrap();
        assert_eq!(delta.address, "ABCD");
        assert_eq!(delta.parent, UNSET_ADDRESS);
    }

    #[test]
    fn same_address_in_other_case_keeps_parent() {
        let mut registry = DeviceRegistry::new();
        let first = status(serde_json::json!({"UID": "AABBCCDD", "ZbAddr": "ab12", "ZbPrntAddr": "0000"}));
        registry.create(&first, uid("AABBCCDD"), 1, "n".into()).unwrap();

        let same = status(serde_json::json!({"UID": "AABBCCDD", "ZbAddr": "AB12"}));
        let delta = registry.update("AABBCCDD", &same, 2).unwrap();
        assert_eq!(delta.parent, "0000");
    }

    #[test]
    fn parent_change_keeps_address() {
        let mut registry = DeviceRegistry::new();
        let first = status(serde_json::json!({"UID": "AABBCCDD", "ZbAddr": "1234"}));
        registry.create(&first, uid("AABBCCDD"), 1, "n".into()).unwrap();

        let reparented = topology(serde_json::json!({"UID": "AABBCCDD", "ZbPrntAddr": "5678"}));
        let delta = registry.update("AABBCCDD", &reparented, 2).unwrap();
        assert_eq!(delta.address, "1234");
        assert_eq!(delta.parent, "5678");
    }

    #[test]
    fn address_and_parent_in_one_record() {
        let mut registry = DeviceRegistry::new();
        let first = status(serde_json::json!({"UID": "AABBCCDD", "ZbAddr": "1234", "ZbPrntAddr": "0000"}));
        registry.create(&first, uid("AABBCCDD"), 1, "n".into()).unwrap();

        let both = status(serde_json::json!({"ZbAddr": "9999", "ZbPrntAddr": "1111"}));
        let delta = registry.update("AABBCCDD", &both, 2).unwrap();
        assert_eq!(delta.address, "9999");
        assert_eq!(delta.parent, "1111");
    }

    #[test]
    fn mismatched_uid_leaves_device_untouched() {
        let mut registry = DeviceRegistry::new();
        let first = status(serde_json::json!({"UID": "AABBCCDD", "ZbAddr": "1234"}));
        registry.create(&first, uid("AABBCCDD"), 1, "n".into()).unwrap();
        let before = registry.get("AABBCCDD").unwrap().clone();

        let other = status(serde_json::json!({"UID": "11223344", "ZbAddr": "9999", "Temperature": 1}));
        let err = registry.update("AABBCCDD", &other, 9).unwrap_err();
        assert!(matches!(err, RecordError::IdentityMismatch { .. }));
        assert_eq!(registry.get("AABBCCDD").unwrap(), &before);
    }

    #[test]
    fn sequence_ids_follow_registry_size() {
        let mut registry = DeviceRegistry::new();
        for (i, id) in ["11111111", "22222222", "33333333"].iter().enumerate() {
            let record = status(serde_json::json!({"UID": id, "ZbAddr": format!("{i}")}));
            let device = registry.create(&record, uid(id), 0, "n".into()).unwrap();
            assert_eq!(device.id(), i as u32);
        }
        let ids: Vec<_> = registry.devices().iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn duplicate_create_is_rejected() {
        let mut registry = DeviceRegistry::new();
        let record = status(serde_json::json!({"UID": "AABBCCDD", "ZbAddr": "1"}));
        registry.create(&record, uid("AABBCCDD"), 0, "n".into()).unwrap();
        let err = registry
            .create(&record, uid("AABBCCDD"), 0, "n".into())
            .unwrap_err();
        assert!(matches!(err, RecordError::DuplicateIdentity { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn find_by_address_ignores_case() {
        let mut registry = DeviceRegistry::new();
        let record = status(serde_json::json!({"UID": "AABBCCDD", "ZbAddr": "ab12"}));
        registry.create(&record, uid("AABBCCDD"), 0, "n".into()).unwrap();
        assert!(registry.find_by_address("AB12").is_some());
        assert!(registry.find_by_address("ab12").is_some());
        assert!(registry.find_by_address(UNSET_ADDRESS).is_none());
        assert!(registry.find_by_address("").is_none());
    }

    #[test]
    fn snapshot_and_serialization_use_wire_names() {
        let record = status(serde_json::json!({"UID": "AABBCCDD", "ZbAddr": "1234"}));
        let mut device = Device::from_status(uid("AABBCCDD"), &record, 0, 1, "NodeDD".into()).unwrap();
        device.commit_provisioning(true);

        let snapshot = device.snapshot();
        assert_eq!(snapshot.field_names().len(), 13);
        assert_eq!(snapshot.provisioned, Some(1));

        let value = serde_json::to_value(&device).unwrap();
        assert_eq!(value["Name"], "NodeDD");
        assert_eq!(value["Provisioned"], 1);
        assert_eq!(value["Battery"]["State"], -1);
    }

    #[test]
    fn provisioning_never_regresses() {
        let record = status(serde_json::json!({"UID": "AABBCCDD", "ZbAddr": "1234"}));
        let mut device = Device::from_status(uid("AABBCCDD"), &record, 0, 1, "n".into()).unwrap();
        assert_eq!(device.commit_provisioning(true), ProvisioningStatus::Provisioned);
        assert_eq!(device.commit_provisioning(false), ProvisioningStatus::Provisioned);
    }
}
