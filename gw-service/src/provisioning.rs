//! Provisioning driver: calls the identity service for one device.

use std::sync::Arc;
use std::time::Duration;

use gw_types::{ProvisioningPayload, ProvisioningProfile, ProvisioningRequest};
use thiserror::Error;

use crate::identity::{check_response, IdentityError, IdentityService};

/// Default module hosting the identity service.
pub const DEFAULT_IDENTITY_MODULE: &str = "edgeIdentityTranslation";

/// Default provisioning method name.
pub const DEFAULT_PROVISION_METHOD: &str = "provision_leaf_device";

/// Default timeout for one provisioning call.
pub const DEFAULT_PROVISIONING_TIMEOUT: Duration = Duration::from_secs(60);

/// Provisioning failures. Each one marks the device failed.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// The identity service call failed or was rejected.
    #[error("identity service: {0}")]
    Identity(#[from] IdentityError),

    /// The identity service did not answer in time.
    #[error("provisioning timed out after {0:?}")]
    Timeout(Duration),

    /// The profile lacks required fields; the service is not called.
    #[error("incomplete provisioning profile, missing {}", missing.join(", "))]
    IncompleteProfile {
        /// Names of the empty fields.
        missing: Vec<&'static str>,
    },
}

/// Issues provisioning calls with a timeout.
pub struct ProvisioningDriver {
    service: Arc<dyn IdentityService>,
    module_id: String,
    method: String,
    timeout: Duration,
}

impl std::fmt::Debug for ProvisioningDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisioningDriver")
            .field("module_id", &self.module_id)
            .field("method", &self.method)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ProvisioningDriver {
    /// Create a driver with the default module, method and timeout.
    pub fn new(service: Arc<dyn IdentityService>) -> Self {
        Self {
            service,
            module_id: DEFAULT_IDENTITY_MODULE.to_string(),
            method: DEFAULT_PROVISION_METHOD.to_string(),
            timeout: DEFAULT_PROVISIONING_TIMEOUT,
        }
    }

    /// Set the target module and method.
    pub fn with_method(mut self, module_id: impl Into<String>, method: impl Into<String>) -> Self {
        self.module_id = module_id.into();
        self.method = method.into();
        self
    }

    /// Set the call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Call timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Build the request for a profile.
    pub fn request(&self, profile: &ProvisioningProfile) -> ProvisioningRequest {
        ProvisioningRequest::new(
            self.module_id.clone(),
            self.method.clone(),
            ProvisioningPayload::from_profile(profile),
        )
    }

    /// Provision one device.
    ///
    /// Must not be awaited while holding the gateway state lock.
    pub async fn provision(&self, profile: &ProvisioningProfile) -> Result<(), ProvisioningError> {
        let missing = profile.missing_fields();
        if !missing.is_empty() {
            return Err(ProvisioningError::IncompleteProfile { missing });
        }
        let request = self.request(profile);
        tracing::debug!(
            "Provisioning {} via {}/{}",
            profile.device_id,
            self.module_id,
            self.method
        );

        let response = tokio::time::timeout(self.timeout, self.service.invoke(&request))
            .await
            .map_err(|_| ProvisioningError::Timeout(self.timeout))??;
        check_response(response.as_ref(), None)?;
        Ok(())
    }
}
