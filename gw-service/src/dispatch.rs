//! Relay dispatcher: forwards device changes once a device is provisioned.

use std::sync::Arc;
use std::time::Duration;

use gw_core::{Device, ProvisioningStatus};
use gw_types::{DeltaRecord, RelayMessage};

use crate::relay::{RelayClient, RelayError};

/// Default output channel for device changes.
pub const DEFAULT_OUTPUT_CHANNEL: &str = "identitytranslation_output";

/// Default timeout for one relay send.
pub const DEFAULT_RELAY_TIMEOUT: Duration = Duration::from_secs(30);

/// Why a change was not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Device is not provisioned.
    NotProvisioned(ProvisioningStatus),
    /// Nothing to send.
    NoDelta,
    /// No physical identifier configured for the device.
    NoPhysicalId,
}

/// Result of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Not sent.
    Skipped(SkipReason),
    /// Handed to the relay client.
    Sent,
    /// The relay client (or serialization) failed; the change is dropped.
    Failed(String),
}

impl DispatchOutcome {
    /// Whether the change was sent.
    pub fn is_sent(&self) -> bool {
        matches!(self, DispatchOutcome::Sent)
    }
}

/// Sends device deltas to the relay client on a fixed output channel.
pub struct RelayDispatcher {
    client: Arc<dyn RelayClient>,
    output_channel: String,
    timeout: Duration,
}

impl std::fmt::Debug for RelayDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayDispatcher")
            .field("output_channel", &self.output_channel)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RelayDispatcher {
    /// Create a dispatcher on the default output channel.
    pub fn new(client: Arc<dyn RelayClient>) -> Self {
        Self {
            client,
            output_channel: DEFAULT_OUTPUT_CHANNEL.to_string(),
            timeout: DEFAULT_RELAY_TIMEOUT,
        }
    }

    /// Use a different output channel.
    pub fn with_output_channel(mut self, output_channel: impl Into<String>) -> Self {
        self.output_channel = output_channel.into();
        self
    }

    /// Set the send timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Output channel in use.
    pub fn output_channel(&self) -> &str {
        &self.output_channel
    }

    /// Send timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `delta` for `device`.
    ///
    /// Skips devices that are not provisioned, empty changes and devices
    /// without a physical identifier. Relay failures, including a send that
    /// outlives the timeout, are logged and reported in the outcome, never
    /// retried.
    pub async fn dispatch(
        &self,
        device: &Device,
        delta: Option<&DeltaRecord>,
        physical_id: Option<&str>,
    ) -> DispatchOutcome {
        let status = device.provisioning();
        if status != ProvisioningStatus::Provisioned {
            return DispatchOutcome::Skipped(SkipReason::NotProvisioned(status));
        }
        let Some(delta) = delta else {
            return DispatchOutcome::Skipped(SkipReason::NoDelta);
        };
        let Some(physical_id) = physical_id.filter(|id| !id.is_empty()) else {
            tracing::debug!("No physical id for {}, not relaying", device.uid());
            return DispatchOutcome::Skipped(SkipReason::NoPhysicalId);
        };

        let body = match delta.to_json() {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("Cannot serialize change for {}: {}", device.uid(), e);
                return DispatchOutcome::Failed(e.to_string());
            }
        };

        tracing::info!(
            "Sending {} -> {}: {}",
            device.uid(),
            self.output_channel,
            body
        );
        let message = RelayMessage::json(physical_id, body);
        let sent = tokio::time::timeout(
            self.timeout,
            self.client.send_to_output(message, &self.output_channel),
        )
        .await
        .unwrap_or(Err(RelayError::Timeout(self.timeout)));
        match sent {
            Ok(()) => DispatchOutcome::Sent,
            Err(e) => {
                tracing::error!("Relay to {} failed for {}: {}", self.output_channel, device.uid(), e);
                DispatchOutcome::Failed(e.to_string())
            }
        }
    }
}
