//! # gw-core
//!
//! Pure device-state logic for the edge gateway (no I/O, instant tests).
//!
//! This crate implements line reassembly, record decoding, identity
//! resolution, the device registry and the provisioning state machine
//! without any network or disk I/O.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. Nothing here logs: rejected records and errors are
//! returned to the caller, which decides how to report them.
//!
//! The actual I/O (identity service calls, relaying, serial mirroring) is
//! performed by `gw-service`, which drives [`GatewayState`] and acts on the
//! [`ProvisioningPlan`] it produces.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod decoder;
pub mod error;
pub mod pool;
pub mod provisioning;
pub mod registry;
pub mod resolver;
pub mod state;

pub use buffer::{LineBuffer, DEFAULT_MAX_PENDING};
pub use decoder::{
    decode, DecodedLine, Record, RecordKind, RejectedRecord, EPOCH_ABSENT, EPOCH_ERROR,
};
pub use error::{DecodeError, ReassemblyError, RecordError};
pub use pool::{ConfigPool, PLACEHOLDER_MARKER};
pub use provisioning::{ProvisioningPlan, ProvisioningStatus};
pub use registry::{Device, DeviceRecord, DeviceRegistry, UNSET_ADDRESS};
pub use resolver::{display_name, resolve, Resolution};
pub use state::{
    AppSummary, Change, CoordinatorClock, CoordinatorFirmware, CoordinatorInfo, DeviceUpdate,
    GatewayState,
};
