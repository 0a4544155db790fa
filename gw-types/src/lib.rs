//! # gw-types
//!
//! Wire and document types for the edge gateway device-state core.
//!
//! This crate provides the foundational types used across all gateway crates:
//! - [`Uid`], [`ChannelId`] - Identity types for devices and input channels
//! - [`DeviceStatus`], [`NetworkTopology`], [`FirmwareInfo`], [`ClockInfo`] - Inbound records
//! - [`DeltaRecord`] - Minimal device change relayed onward
//! - [`NetConfig`], [`PoolEntry`], [`ProvisioningProfile`] - Configuration pool document
//! - [`RelayMessage`], [`ProvisioningRequest`], [`MethodResponse`] - Outbound messages
//! - [`WireError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod delta;
mod error;
mod ids;
pub mod lenient;
mod messages;
mod pool;
mod records;

pub use delta::DeltaRecord;
pub use error::WireError;
pub use ids::{ChannelId, Uid, UID_LEN};
pub use messages::{
    MethodResponse, ProvisioningPayload, ProvisioningRequest, RelayMessage, CONTENT_ENCODING_UTF8,
    CONTENT_TYPE_JSON, PROPERTY_DEVICE_PHYSICAL_ID,
};
pub use pool::{NetConfig, PoolEntry, ProvisioningProfile};
pub use records::{Battery, ClockInfo, DeviceStatus, FirmwareInfo, NetworkTopology, TopologyEntry};
