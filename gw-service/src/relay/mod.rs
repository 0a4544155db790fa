//! Relay client abstraction.
//!
//! The relay client hands device changes to the message bus on a named
//! output channel. Delivery is fire-and-forget from the gateway's point of
//! view: errors are reported to the caller, never retried.

mod mock;

pub use mock::MockRelayClient;

use std::time::Duration;

use async_trait::async_trait;
use gw_types::RelayMessage;
use thiserror::Error;

/// Relay client errors.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Not connected to the message bus.
    #[error("relay client not connected")]
    NotConnected,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// The client did not complete the send in time.
    #[error("send timed out after {0:?}")]
    Timeout(Duration),
}

/// Client for sending messages to a named output.
#[async_trait]
pub trait RelayClient: Send + Sync {
    /// Send a message on the given output channel.
    async fn send_to_output(&self, message: RelayMessage, output: &str) -> Result<(), RelayError>;
}

/// Relay client that only logs messages, for running without a message bus.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRelayClient;

#[async_trait]
impl RelayClient for LogRelayClient {
    async fn send_to_output(&self, message: RelayMessage, output: &str) -> Result<(), RelayError> {
        tracing::info!(
            "Relay [{}] id={} device={} body={}",
            output,
            message.message_id,
            message.device_physical_id().unwrap_or("-"),
            message.body
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_client_accepts_messages() {
        let client = LogRelayClient;
        let message = RelayMessage::json("phys-1", "{}");
        assert!(client.send_to_output(message, "out").await.is_ok());
    }

    #[test]
    fn error_display() {
        let err = RelayError::SendFailed("bus down".into());
        assert_eq!(err.to_string(), "send failed: bus down");
    }
}
