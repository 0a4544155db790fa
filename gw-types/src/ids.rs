//! Identity types for devices and input channels.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;

use crate::WireError;

/// Required length of a device UID, in characters.
pub const UID_LEN: usize = 8;

/// Stable logical identifier of a sensor node.
///
/// Exactly [`UID_LEN`] characters, independent of the node's transport
/// address. Immutable once assigned to a device.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Uid(String);

impl Uid {
    /// Validate and wrap a UID.
    ///
    /// Fails if the identifier is empty or not exactly [`UID_LEN`] characters.
    pub fn parse(uid: &str) -> Result<Self, WireError> {
        if uid.is_empty() || uid.chars().count() != UID_LEN {
            return Err(WireError::InvalidUid {
                uid: uid.to_string(),
                expected: UID_LEN,
            });
        }
        Ok(Self(uid.to_string()))
    }

    /// Check whether a string would be accepted by [`Uid::parse`].
    pub fn is_valid(uid: &str) -> bool {
        !uid.is_empty() && uid.chars().count() == UID_LEN
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last two characters, used for synthetic display names.
    pub fn suffix(&self) -> &str {
        let start = self
            .0
            .char_indices()
            .rev()
            .nth(1)
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        &self.0[start..]
    }
}

impl TryFrom<String> for Uid {
    type Error = WireError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Uid> for String {
    fn from(uid: Uid) -> Self {
        uid.0
    }
}

impl Borrow<str> for Uid {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Uid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uid({})", self.0)
    }
}

/// Identifier of a logical input channel (one serial stream).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(String);

impl ChannelId {
    /// Channel used when the transport does not name one.
    pub const GENERIC: &'static str = "generic";

    /// Create a channel identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The default channel.
    pub fn generic() -> Self {
        Self(Self::GENERIC.to_string())
    }

    /// Pick the channel from inbound message properties.
    ///
    /// `serial_port` wins over `device_physical_id`; neither falls back to
    /// [`ChannelId::GENERIC`].
    pub fn from_properties(properties: &HashMap<String, String>) -> Self {
        properties
            .get("serial_port")
            .or_else(|| properties.get("device_physical_id"))
            .map(|id| Self(id.clone()))
            .unwrap_or_else(Self::generic)
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ChannelId {
    fn default() -> Self {
        Self::generic()
    }
}

impl From<&str> for ChannelId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelId({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_accepts_exactly_eight_chars() {
        let uid = Uid::parse("AABBCCDD").unwrap();
        assert_eq!(uid.as_str(), "AABBCCDD");
        assert!(Uid::is_valid("12345678"));
    }

    #[test]
    fn uid_rejects_empty_and_wrong_length() {
        assert!(Uid::parse("").is_err());
        assert!(Uid::parse("AABBCCD").is_err());
        assert!(Uid::parse("AABBCCDDE").is_err());
        assert!(!Uid::is_valid(""));
    }

    #[test]
    fn uid_length_counts_characters_not_bytes() {
        // 8 chars, more than 8 bytes
        assert!(Uid::parse("ÄÄBBCCDD").is_ok());
    }

    #[test]
    fn uid_suffix_is_last_two_chars() {
        let uid = Uid::parse("AABBCC1F").unwrap();
        assert_eq!(uid.suffix(), "1F");
    }

    #[test]
    fn uid_deserialize_validates() {
        let ok: Result<Uid, _> = serde_json::from_str("\"AABBCCDD\"");
        assert!(ok.is_ok());
        let bad: Result<Uid, _> = serde_json::from_str("\"SHORT\"");
        assert!(bad.is_err());
    }

    #[test]
    fn channel_from_properties_prefers_serial_port() {
        let mut props = HashMap::new();
        props.insert("device_physical_id".to_string(), "dev-1".to_string());
        assert_eq!(ChannelId::from_properties(&props).as_str(), "dev-1");

        props.insert("serial_port".to_string(), "ttyUSB0".to_string());
        assert_eq!(ChannelId::from_properties(&props).as_str(), "ttyUSB0");
    }

    #[test]
    fn channel_defaults_to_generic() {
        assert_eq!(ChannelId::from_properties(&HashMap::new()), ChannelId::generic());
        assert_eq!(ChannelId::default().as_str(), "generic");
    }
}
