//! Identity service abstraction.
//!
//! The identity service provisions leaf devices with the cloud. It is
//! reached through a direct method call on a sibling module:
//! - `invoke()` sends a [`ProvisioningRequest`] and returns the raw response
//! - [`check_response`] turns a response into success or failure
//!
//! # Example
//!
//! ```ignore
//! let service = MockIdentityService::new();
//! let response = service.invoke(&request).await?;
//! check_response(response.as_ref(), None)?;
//! ```

mod mock;

pub use mock::MockIdentityService;

use async_trait::async_trait;
use gw_types::{MethodResponse, ProvisioningRequest};
use serde_json::Value;
use thiserror::Error;

/// Identity service errors.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// No identity service is connected.
    #[error("identity service unavailable")]
    Unavailable,

    /// The method call itself failed.
    #[error("method invocation failed: {0}")]
    Invocation(String),

    /// The service answered with a non-success status.
    #[error("provisioning rejected (status {status}): {reason}")]
    Rejected {
        /// Response status.
        status: u16,
        /// Error reported by the service.
        reason: String,
    },
}

/// Client for the identity service.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Invoke a method on the identity module.
    ///
    /// `Ok(None)` means the call completed without a response body.
    async fn invoke(
        &self,
        request: &ProvisioningRequest,
    ) -> Result<Option<MethodResponse>, IdentityError>;
}

/// Interpret a method response.
///
/// This is the generic helper for any method call on the identity module,
/// exported for callers beyond the provisioning driver.
///
/// - No response is a success.
/// - `value_to_return: None`: a non-200 status is a failure; provisioning
///   calls use this form.
/// - `value_to_return: Some(name)`: the payload field `name` (if any) is
///   returned regardless of status, for methods whose answer is a value
///   rather than an outcome.
pub fn check_response(
    response: Option<&MethodResponse>,
    value_to_return: Option<&str>,
) -> Result<Option<Value>, IdentityError> {
    let Some(response) = response else {
        return Ok(None);
    };
    match value_to_return {
        Some(name) => Ok(response.payload_field(name).cloned()),
        None if !response.is_success() => Err(IdentityError::Rejected {
            status: response.status,
            reason: response
                .error_message()
                .unwrap_or_else(|| "no error reported".to_string()),
        }),
        None => Ok(None),
    }
}

/// Identity service used when the gateway runs without a cloud connection.
///
/// Every call fails with [`IdentityError::Unavailable`].
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableIdentityService;

#[async_trait]
impl IdentityService for UnavailableIdentityService {
    async fn invoke(
        &self,
        _request: &ProvisioningRequest,
    ) -> Result<Option<MethodResponse>, IdentityError> {
        Err(IdentityError::Unavailable)
    }
}
