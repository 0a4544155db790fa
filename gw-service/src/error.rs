//! Error types for gw-service.

use gw_core::{DecodeError, ReassemblyError, RecordError};

use crate::provisioning::ProvisioningError;
use crate::relay::RelayError;

/// Main error type for gateway pipeline operations.
///
/// Every variant is contained to the fragment, line or record that caused
/// it; none of them stops the gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Channel buffer overflowed.
    #[error("reassembly error: {0}")]
    Reassembly(#[from] ReassemblyError),

    /// Line could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Record could not be applied.
    #[error("record error: {0}")]
    Record(#[from] RecordError),

    /// Provisioning failed.
    #[error("provisioning error: {0}")]
    Provisioning(#[from] ProvisioningError),

    /// Relay failed.
    #[error("relay error: {0}")]
    Relay(#[from] RelayError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_and_display() {
        let err: GatewayError = RecordError::InvalidIdentity { uid: "X".into() }.into();
        assert_eq!(err.to_string(), "record error: invalid identity \"X\"");

        let err: GatewayError = ReassemblyError::Overflow {
            discarded: 10,
            limit: 5,
        }
        .into();
        assert!(matches!(err, GatewayError::Reassembly(_)));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GatewayError>();
    }
}
