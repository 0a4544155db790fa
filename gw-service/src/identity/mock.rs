//! Mock identity service for testing.
//!
//! Allows queueing responses and capturing requests for verification.

use super::{IdentityError, IdentityService};
use async_trait::async_trait;
use gw_types::{MethodResponse, ProvisioningRequest};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Mock identity service for testing.
///
/// Answers `200` unless a response was queued or a failure requested.
#[derive(Debug, Default)]
pub struct MockIdentityService {
    inner: Arc<Mutex<MockIdentityInner>>,
}

#[derive(Debug, Default)]
struct MockIdentityInner {
    requests: Vec<ProvisioningRequest>,
    responses: VecDeque<Option<MethodResponse>>,
    fail_next: Option<String>,
    delay: Option<Duration>,
}

impl MockIdentityService {
    /// Create a new mock service.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockIdentityInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue the response for the next call.
    pub fn queue_response(&self, response: Option<MethodResponse>) {
        self.lock().responses.push_back(response);
    }

    /// Cause the next call to fail with the given error.
    pub fn fail_next(&self, error: &str) {
        self.lock().fail_next = Some(error.to_string());
    }

    /// Delay every call, e.g. to exercise timeouts.
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<ProvisioningRequest> {
        self.lock().requests.clone()
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.lock().requests.len()
    }
}

impl Clone for MockIdentityService {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl IdentityService for MockIdentityService {
    async fn invoke(
        &self,
        request: &ProvisioningRequest,
    ) -> Result<Option<MethodResponse>, IdentityError> {
        // Guard is released before awaiting.
        let delay = {
            let mut inner = self.lock();
            inner.requests.push(request.clone());
            inner.delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.lock();
        if let Some(error) = inner.fail_next.take() {
            return Err(IdentityError::Invocation(error));
        }
        Ok(inner
            .responses
            .pop_front()
            .unwrap_or_else(|| Some(MethodResponse::ok())))
    }
}
