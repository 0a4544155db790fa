//! Mock relay client for testing.

use super::{RelayClient, RelayError};
use async_trait::async_trait;
use gw_types::RelayMessage;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Mock relay client that captures sent messages.
#[derive(Debug, Default)]
pub struct MockRelayClient {
    inner: Arc<Mutex<MockRelayInner>>,
}

#[derive(Debug, Default)]
struct MockRelayInner {
    sent: Vec<(String, RelayMessage)>,
    fail_next: Option<String>,
    delay: Option<Duration>,
}

impl MockRelayClient {
    /// Create a new mock client.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockRelayInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cause the next send to fail with the given error.
    pub fn fail_next(&self, error: &str) {
        self.lock().fail_next = Some(error.to_string());
    }

    /// Delay every send by `delay` before it completes.
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    /// All messages sent, with their output channel.
    pub fn sent(&self) -> Vec<(String, RelayMessage)> {
        self.lock().sent.clone()
    }

    /// All message bodies sent.
    pub fn sent_bodies(&self) -> Vec<String> {
        self.lock()
            .sent
            .iter()
            .map(|(_, message)| message.body.clone())
            .collect()
    }

    /// The last message sent.
    pub fn last_sent(&self) -> Option<RelayMessage> {
        self.lock().sent.last().map(|(_, message)| message.clone())
    }

    /// Number of messages sent.
    pub fn sent_count(&self) -> usize {
        self.lock().sent.len()
    }
}

impl Clone for MockRelayClient {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl RelayClient for MockRelayClient {
    async fn send_to_output(&self, message: RelayMessage, output: &str) -> Result<(), RelayError> {
        let delay = self.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.lock();

        // Check for forced failure
        if let Some(error) = inner.fail_next.take() {
            return Err(RelayError::SendFailed(error));
        }

        inner.sent.push((output.to_string(), message));
        Ok(())
    }
}
