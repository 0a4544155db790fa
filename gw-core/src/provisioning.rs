//! Provisioning state machine.
//!
//! ```text
//!                 success
//!   Unprovisioned ───────► Provisioned
//!         │
//!         │ failure / timeout
//!         ▼
//!       Failed
//! ```
//!
//! Both outcomes are terminal. A device without a configured profile stays
//! `Unprovisioned`.

use gw_types::{PoolEntry, ProvisioningProfile};
use serde::{Serialize, Serializer};

/// Provisioning status of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProvisioningStatus {
    /// Not provisioned yet (code 0)
    #[default]
    Unprovisioned,
    /// Provisioned with the identity service (code 1)
    Provisioned,
    /// Provisioning failed; not retried (code -1)
    Failed,
}

impl ProvisioningStatus {
    /// Numeric code used on the wire.
    pub fn code(self) -> i8 {
        match self {
            ProvisioningStatus::Unprovisioned => 0,
            ProvisioningStatus::Provisioned => 1,
            ProvisioningStatus::Failed => -1,
        }
    }

    /// Whether the device still needs a provisioning attempt.
    pub fn needs_provisioning(self) -> bool {
        self == ProvisioningStatus::Unprovisioned
    }

    /// Status after an attempt with the given outcome.
    ///
    /// Only `Unprovisioned` moves; settled states are returned unchanged.
    pub fn on_outcome(self, succeeded: bool) -> Self {
        match self {
            ProvisioningStatus::Unprovisioned if succeeded => ProvisioningStatus::Provisioned,
            ProvisioningStatus::Unprovisioned => ProvisioningStatus::Failed,
            settled => settled,
        }
    }
}

impl Serialize for ProvisioningStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i8(self.code())
    }
}

impl std::fmt::Display for ProvisioningStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProvisioningStatus::Unprovisioned => "unprovisioned",
            ProvisioningStatus::Provisioned => "provisioned",
            ProvisioningStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What to do about provisioning after a record touched a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningPlan {
    /// Status is already terminal.
    AlreadySettled(ProvisioningStatus),
    /// No pool entry or no profile; stay unprovisioned.
    NoProfile,
    /// Call the identity service with this profile.
    Required(ProvisioningProfile),
}

/// Decide the provisioning step for a device.
pub fn plan(status: ProvisioningStatus, entry: Option<&PoolEntry>) -> ProvisioningPlan {
    if !status.needs_provisioning() {
        return ProvisioningPlan::AlreadySettled(status);
    }
    match entry.and_then(|e| e.provisioning.as_ref()) {
        Some(profile) => ProvisioningPlan::Required(profile.clone()),
        None => ProvisioningPlan::NoProfile,
    }
}
