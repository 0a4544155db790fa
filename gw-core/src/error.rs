//! Error types for the pure gateway logic.

use thiserror::Error;

/// Errors from reassembling a channel's byte stream into lines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReassemblyError {
    /// The unterminated tail grew past the configured limit and was dropped.
    #[error("pending line exceeded {limit} bytes; discarded {discarded} bytes")]
    Overflow {
        /// Bytes discarded.
        discarded: usize,
        /// Configured limit.
        limit: usize,
    },
}

/// Errors from decoding a complete line.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Line is not valid JSON
    #[error("malformed line: {0}")]
    Malformed(#[source] serde_json::Error),

    /// Line is valid JSON but not an object
    #[error("line is not a JSON object")]
    NotAnObject,
}

/// Errors from applying a record to the registry.
///
/// All of these drop the record and leave the registry unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// UID empty or not exactly 8 characters
    #[error("invalid identity {uid:?}")]
    InvalidIdentity {
        /// The rejected identifier.
        uid: String,
    },

    /// Record carries a UID different from the device it resolved to
    #[error("identity mismatch: device {expected} received record for {found}")]
    IdentityMismatch {
        /// UID of the stored device.
        expected: String,
        /// UID carried by the record.
        found: String,
    },

    /// New device record without a transport address
    #[error("record for new device {uid} has no address")]
    MissingAddress {
        /// UID of the device that could not be created.
        uid: String,
    },

    /// Device with this UID already exists
    #[error("device {uid} already registered")]
    DuplicateIdentity {
        /// The duplicated UID.
        uid: String,
    },

    /// No device with this UID
    #[error("unknown device {uid}")]
    UnknownDevice {
        /// The UID that was looked up.
        uid: String,
    },
}
