//! Error types for gateway wire types.

use thiserror::Error;

/// Errors that can occur when building or (de)serializing wire types.
#[derive(Debug, Error)]
pub enum WireError {
    /// Device identifier is empty or has the wrong length
    #[error("invalid uid {uid:?}: expected exactly {expected} characters")]
    InvalidUid {
        /// The rejected identifier.
        uid: String,
        /// Required length in characters.
        expected: usize,
    },

    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// JSON deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = WireError::InvalidUid {
            uid: "ABC".into(),
            expected: 8,
        };
        assert_eq!(
            err.to_string(),
            "invalid uid \"ABC\": expected exactly 8 characters"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<WireError>();
    }
}
