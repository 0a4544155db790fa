//! Gateway state: registry, configuration pool and coordinator info.
//!
//! [`GatewayState`] is the single piece of shared mutable state. It applies
//! one device record at a time and returns everything the caller needs to
//! provision and relay without holding on to the state:
//! a copy of the device, the change, and the provisioning plan.

use gw_types::{ClockInfo, DeltaRecord, FirmwareInfo};
use serde::Serialize;

use crate::provisioning::{self, ProvisioningPlan, ProvisioningStatus};
use crate::resolver::{self, Resolution};
use crate::{ConfigPool, Device, DeviceRecord, DeviceRegistry, RecordError};

const UNKNOWN: &str = "-";

/// Firmware of the attached controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CoordinatorFirmware {
    /// Firmware name
    pub name: String,
    /// Firmware version
    pub version: String,
    /// Build date
    pub date: String,
}

/// Clock of the attached controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CoordinatorClock {
    /// Date
    pub date: String,
    /// Time
    pub time: String,
}

/// What the gateway knows about its controller. Unknown values are `"-"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CoordinatorInfo {
    /// Firmware
    pub firmware: CoordinatorFirmware,
    /// Clock
    pub clock: CoordinatorClock,
}

impl Default for CoordinatorInfo {
    fn default() -> Self {
        Self {
            firmware: CoordinatorFirmware {
                name: UNKNOWN.into(),
                version: UNKNOWN.into(),
                date: UNKNOWN.into(),
            },
            clock: CoordinatorClock {
                date: UNKNOWN.into(),
                time: UNKNOWN.into(),
            },
        }
    }
}

/// Application summary: coordinator info and device count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppSummary {
    /// Controller info
    #[serde(rename = "CoordinatorInfo")]
    pub coordinator: CoordinatorInfo,
    /// Number of registered devices
    #[serde(rename = "DeviceNumber")]
    pub device_count: usize,
}

/// How a record changed the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// A new device was registered.
    Created,
    /// An existing device was updated.
    Updated(DeltaRecord),
}

impl Change {
    /// Change to relay for `device`: the full snapshot for a new device,
    /// otherwise the update delta.
    pub fn into_delta(self, device: &Device) -> DeltaRecord {
        match self {
            Change::Created => device.snapshot(),
            Change::Updated(delta) => delta,
        }
    }
}

/// Result of applying one device record.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceUpdate {
    /// Device after the record was applied.
    pub device: Device,
    /// What changed.
    pub change: Change,
    /// Provisioning step to take next.
    pub plan: ProvisioningPlan,
}

/// Shared device state of the gateway.
#[derive(Debug, Default)]
pub struct GatewayState {
    registry: DeviceRegistry,
    pool: ConfigPool,
    coordinator: CoordinatorInfo,
}

impl GatewayState {
    /// Create state backed by a configuration pool.
    pub fn new(pool: ConfigPool) -> Self {
        Self {
            registry: DeviceRegistry::new(),
            pool,
            coordinator: CoordinatorInfo::default(),
        }
    }

    /// Resolve a record's identity without changing anything.
    pub fn resolve<R: DeviceRecord + ?Sized>(&self, record: &R) -> Result<Resolution, RecordError> {
        resolver::resolve(
            &self.registry,
            record.declared_uid(),
            record.declared_address(),
        )
    }

    /// Apply a device record.
    ///
    /// New devices take their name from the pool entry they will receive and
    /// claim it once created. On error nothing is changed.
    pub fn apply<R: DeviceRecord + ?Sized>(
        &mut self,
        record: &R,
        epoch: i64,
    ) -> Result<DeviceUpdate, RecordError> {
        let (uid, change) = match self.resolve(record)? {
            Resolution::New(uid) => {
                let name = resolver::display_name(&uid, self.pool.preview(uid.as_str()));
                self.registry.create(record, uid.clone(), epoch, name)?;
                self.pool.claim(&uid);
                (uid, Change::Created)
            }
            Resolution::Known(uid) => {
                let delta = self.registry.update(uid.as_str(), record, epoch)?;
                (uid, Change::Updated(delta))
            }
        };

        let device = self
            .registry
            .get(uid.as_str())
            .cloned()
            .ok_or_else(|| RecordError::UnknownDevice {
                uid: uid.to_string(),
            })?;
        let plan = provisioning::plan(device.provisioning(), self.pool.get(uid.as_str()));

        Ok(DeviceUpdate {
            device,
            change,
            plan,
        })
    }

    /// Record a provisioning outcome; returns the device afterwards.
    pub fn commit_provisioning(&mut self, uid: &str, succeeded: bool) -> Option<Device> {
        let device = self.registry.get_mut(uid)?;
        device.commit_provisioning(succeeded);
        Some(device.clone())
    }

    /// Provisioning status of a device.
    pub fn provisioning_status(&self, uid: &str) -> Option<ProvisioningStatus> {
        self.registry.get(uid).map(Device::provisioning)
    }

    /// Physical identifier configured for a device.
    pub fn physical_id(&self, uid: &str) -> Option<String> {
        self.pool.physical_id(uid).map(str::to_string)
    }

    /// Merge a firmware record into the coordinator info.
    pub fn apply_firmware(&mut self, firmware: &FirmwareInfo) {
        let target = &mut self.coordinator.firmware;
        overlay(&mut target.name, &firmware.name);
        overlay(&mut target.version, &firmware.version);
        overlay(&mut target.date, &firmware.date);
    }

    /// Merge a clock record into the coordinator info.
    pub fn apply_clock(&mut self, clock: &ClockInfo) {
        let target = &mut self.coordinator.clock;
        overlay(&mut target.date, &clock.date);
        overlay(&mut target.time, &clock.time);
    }

    /// Application summary.
    pub fn app_summary(&self) -> AppSummary {
        AppSummary {
            coordinator: self.coordinator.clone(),
            device_count: self.registry.len(),
        }
    }

    /// The device registry.
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// The configuration pool.
    pub fn pool(&self) -> &ConfigPool {
        &self.pool
    }

    /// Coordinator info.
    pub fn coordinator(&self) -> &CoordinatorInfo {
        &self.coordinator
    }
}

fn overlay(target: &mut String, value: &Option<String>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gw_types::{DeviceStatus, PoolEntry, ProvisioningProfile, TopologyEntry};
    use std::collections::BTreeMap;

    fn profile(physical_id: &str) -> ProvisioningProfile {
        ProvisioningProfile {
            id_scope: "scope".into(),
            device_id: format!("dev-{physical_id}"),
            primary_key: "key".into(),
            device_template_id: "tmpl".into(),
            device_physical_id: physical_id.into(),
        }
    }

    fn pool(entries: &[(&str, Option<&str>, Option<&str>)]) -> ConfigPool {
        let entries: BTreeMap<_, _> = entries
            .iter()
            .map(|(key, name, physical_id)| {
                (
                    key.to_string(),
                    PoolEntry {
                        name: name.map(str::to_string),
                        provisioning: physical_id.map(profile),
                    },
                )
            })
            .collect();
        ConfigPool::new(entries)
    }

    fn status(uid: &str, address: &str) -> DeviceStatus {
        DeviceStatus {
            uid: Some(uid.to_string()),
            address: Some(address.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn new_device_without_config_gets_synthetic_name() {
        let mut state = GatewayState::default();
        let update = state.apply(&status("AABBCCDD", "1234"), 0).unwrap();

        assert_eq!(update.change, Change::Created);
        assert_eq!(update.device.name(), "NodeDD");
        assert_eq!(update.plan, ProvisioningPlan::NoProfile);
        assert_eq!(state.registry().len(), 1);
    }

    #[test]
    fn configured_device_plans_provisioning() {
        let mut state = GatewayState::new(pool(&[("AABBCCDD", Some("Boiler"), Some("phys-1"))]));
        let update = state.apply(&status("AABBCCDD", "1234"), 0).unwrap();

        assert_eq!(update.device.name(), "Boiler");
        assert!(matches!(update.plan, ProvisioningPlan::Required(ref p) if p.device_physical_id == "phys-1"));
        assert_eq!(state.physical_id("AABBCCDD").as_deref(), Some("phys-1"));
    }

    #[test]
    fn new_device_claims_placeholder() {
        let mut state = GatewayState::new(pool(&[("NODE01", Some("Spare"), Some("phys-s"))]));
        let update = state.apply(&status("11223344", "1234"), 0).unwrap();

        assert_eq!(update.device.name(), "Spare");
        assert_eq!(state.pool().claimed_by("NODE01").map(|u| u.as_str()), Some("11223344"));
        assert_eq!(state.physical_id("11223344").as_deref(), Some("phys-s"));

        // A second new device finds no slot left.
        let other = state.apply(&status("55667788", "5678"), 0).unwrap();
        assert_eq!(other.device.name(), "Node88");
        assert_eq!(other.plan, ProvisioningPlan::NoProfile);
        assert_eq!(state.pool().claimed_by("NODE01").map(|u| u.as_str()), Some("11223344"));
    }

    #[test]
    fn failed_creation_does_not_claim() {
        let mut state = GatewayState::new(pool(&[("NODE01", Some("Spare"), Some("phys-s"))]));
        let record = DeviceStatus {
            uid: Some("11223344".into()),
            ..Default::default()
        };
        let err = state.apply(&record, 0).unwrap_err();
        assert!(matches!(err, RecordError::MissingAddress { .. }));
        assert_eq!(state.pool().placeholders_remaining(), 1);
        assert!(state.registry().is_empty());
    }

    #[test]
    fn known_device_yields_update_delta() {
        let mut state = GatewayState::default();
        state.apply(&status("AABBCCDD", "1234"), 0).unwrap();

        let entry = TopologyEntry {
            address: Some("1234".into()),
            rssi: Some(-40),
            ..Default::default()
        };
        let update = state.apply(&entry, 5).unwrap();
        match &update.change {
            Change::Updated(delta) => {
                assert_eq!(delta.uid, "AABBCCDD");
                assert_eq!(delta.rssi, Some(-40));
                assert_eq!(delta.epoch, 5);
            }
            other => panic!("unexpected change {other:?}"),
        }
    }

    #[test]
    fn commit_and_replan() {
        let mut state = GatewayState::new(pool(&[("AABBCCDD", None, Some("phys-1"))]));
        state.apply(&status("AABBCCDD", "1234"), 0).unwrap();

        let device = state.commit_provisioning("AABBCCDD", false).unwrap();
        assert_eq!(device.provisioning(), ProvisioningStatus::Failed);

        let update = state.apply(&status("AABBCCDD", "1234"), 1).unwrap();
        assert_eq!(
            update.plan,
            ProvisioningPlan::AlreadySettled(ProvisioningStatus::Failed)
        );
        assert!(state.commit_provisioning("00000000", true).is_none());
    }

    #[test]
    fn created_change_relays_snapshot() {
        let mut state = GatewayState::default();
        let update = state.apply(&status("AABBCCDD", "1234"), 0).unwrap();
        let delta = update.change.into_delta(&update.device);
        assert_eq!(delta.name.as_deref(), Some("NodeDD"));
        assert_eq!(delta.provisioned, Some(0));
    }

    #[test]
    fn coordinator_info_and_summary() {
        let mut state = GatewayState::default();
        assert_eq!(state.coordinator().firmware.name, "-");

        state.apply_firmware(&FirmwareInfo {
            name: Some("coord".into()),
            version: Some("1.2".into()),
            date: None,
        });
        state.apply_clock(&ClockInfo {
            date: Some("2024-05-01".into()),
            time: Some("10:00:00".into()),
        });
        state.apply(&status("AABBCCDD", "1234"), 0).unwrap();

        let summary = state.app_summary();
        assert_eq!(summary.device_count, 1);
        assert_eq!(summary.coordinator.firmware.version, "1.2");
        assert_eq!(summary.coordinator.firmware.date, "-");

        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["DeviceNumber"], 1);
        assert_eq!(value["CoordinatorInfo"]["Firmware"]["Name"], "coord");
        assert_eq!(value["CoordinatorInfo"]["Clock"]["Time"], "10:00:00");
    }
}
