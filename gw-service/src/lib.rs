//! # gw-service
//!
//! Async pipeline of the edge gateway.
//!
//! This crate drives the pure logic in `gw-core` with real I/O:
//! - [`Gateway`] - per-channel reassembly, record processing and locking
//! - [`IdentityService`] - provisioning calls (with [`MockIdentityService`])
//! - [`RelayClient`] - outbound device changes (with [`MockRelayClient`])
//! - [`ProvisioningDriver`] - identity service calls with a timeout
//! - [`RelayDispatcher`] - relays changes of provisioned devices
//! - [`SerialLog`] - raw fragment mirroring (with [`MemorySerialLog`])
//!
//! ## Example
//!
//! ```ignore
//! let gateway = Gateway::new(
//!     pool,
//!     Arc::new(MockIdentityService::new()),
//!     Arc::new(MockRelayClient::new()),
//!     Arc::new(NullSerialLog),
//!     GatewaySettings::default(),
//! );
//! gateway.feed(&ChannelId::generic(), b"{\"DevSts\":{...}}\n").await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod ingest;
pub mod provisioning;
pub mod relay;

pub use dispatch::{
    DispatchOutcome, RelayDispatcher, SkipReason, DEFAULT_OUTPUT_CHANNEL, DEFAULT_RELAY_TIMEOUT,
};
pub use error::GatewayError;
pub use gateway::{DeviceReport, Gateway, GatewayMetrics, GatewaySettings};
pub use identity::{
    check_response, IdentityError, IdentityService, MockIdentityService,
    UnavailableIdentityService,
};
pub use ingest::{ChannelHub, MemorySerialLog, NullSerialLog, SerialLog};
pub use provisioning::{ProvisioningDriver, ProvisioningError};
pub use relay::{LogRelayClient, MockRelayClient, RelayClient, RelayError};
