//! Identity resolution for incoming records.

use gw_types::{PoolEntry, Uid};

use crate::{DeviceRegistry, RecordError};

/// Outcome of resolving a record's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Matches a registered device.
    Known(Uid),
    /// Valid UID not seen before.
    New(Uid),
}

impl Resolution {
    /// The resolved UID.
    pub fn uid(&self) -> &Uid {
        match self {
            Resolution::Known(uid) | Resolution::New(uid) => uid,
        }
    }

    /// Whether the device has to be created.
    pub fn is_new(&self) -> bool {
        matches!(self, Resolution::New(_))
    }
}

/// Resolve a record's declared identity against the registry.
///
/// Tries the UID, then the transport address (ignoring case). A device found
/// by address resolves to its stored UID even when the record declared a
/// different one; the update then reports the mismatch. Otherwise the
/// declared UID must be valid to name a new device.
pub fn resolve(
    registry: &DeviceRegistry,
    uid: Option<&str>,
    address: Option<&str>,
) -> Result<Resolution, RecordError> {
    if let Some(device) = uid.and_then(|uid| registry.get(uid)) {
        return Ok(Resolution::Known(device.uid().clone()));
    }
    if let Some(device) = address.and_then(|address| registry.find_by_address(address)) {
        return Ok(Resolution::Known(device.uid().clone()));
    }

    let declared = uid.unwrap_or_default();
    Uid::parse(declared)
        .map(Resolution::New)
        .map_err(|_| RecordError::InvalidIdentity {
            uid: declared.to_string(),
        })
}

/// Display name for a device: the configured name, or `Node` plus the last
/// two characters of the UID.
pub fn display_name(uid: &Uid, entry: Option<&PoolEntry>) -> String {
    entry
        .and_then(|entry| entry.name.clone())
        .unwrap_or_else(|| format!("Node{}", uid.suffix()))
}
