//! Outbound messages: provisioning requests and relayed device changes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::{ProvisioningProfile, WireError};

/// Content type of relayed messages.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Content encoding of relayed messages.
pub const CONTENT_ENCODING_UTF8: &str = "utf-8";

/// Custom property carrying the device's physical identifier.
pub const PROPERTY_DEVICE_PHYSICAL_ID: &str = "device_physical_id";

/// Payload of a provisioning method call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningPayload {
    /// Identity service scope
    pub id_scope: String,
    /// Device id registered with the identity service
    pub device_id: String,
    /// Shared access key
    pub primary_key: String,
    /// Device template reference
    pub device_template_id: String,
    /// Physical identifier
    pub device_physical_id: String,
    /// Protocol tag (always 0)
    pub protocol: u8,
}

impl ProvisioningPayload {
    /// Build the payload from a pool entry's profile.
    pub fn from_profile(profile: &ProvisioningProfile) -> Self {
        Self {
            id_scope: profile.id_scope.clone(),
            device_id: profile.device_id.clone(),
            primary_key: profile.primary_key.clone(),
            device_template_id: profile.device_template_id.clone(),
            device_physical_id: profile.device_physical_id.clone(),
            protocol: 0,
        }
    }
}

/// A direct method call to the identity service module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningRequest {
    /// Target module
    pub module_id: String,
    /// Method name
    pub method: String,
    /// Call payload
    pub payload: ProvisioningPayload,
}

impl ProvisioningRequest {
    /// Create a request.
    pub fn new(
        module_id: impl Into<String>,
        method: impl Into<String>,
        payload: ProvisioningPayload,
    ) -> Self {
        Self {
            module_id: module_id.into(),
            method: method.into(),
            payload,
        }
    }

    /// Payload as a JSON value, for clients that send untyped bodies.
    pub fn payload_json(&self) -> Result<Value, WireError> {
        serde_json::to_value(&self.payload).map_err(WireError::Serialization)
    }
}

/// Response of a direct method call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodResponse {
    /// Status code (200 = success)
    pub status: u16,
    /// Optional response payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl MethodResponse {
    /// Successful response without payload.
    pub fn ok() -> Self {
        Self {
            status: 200,
            payload: None,
        }
    }

    /// Response with the given status and payload.
    pub fn with_status(status: u16, payload: Option<Value>) -> Self {
        Self { status, payload }
    }

    /// Whether the call succeeded.
    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    /// The `error` field of the payload, if any.
    pub fn error_message(&self) -> Option<String> {
        let error = self.payload.as_ref()?.get("error")?;
        Some(match error {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Look up a named field of the payload.
    pub fn payload_field(&self, name: &str) -> Option<&Value> {
        self.payload.as_ref()?.get(name)
    }
}

/// A device change handed to the relay client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayMessage {
    /// Unique message id
    pub message_id: Uuid,
    /// Content type tag
    pub content_type: String,
    /// Content encoding tag
    pub content_encoding: String,
    /// Custom application properties
    pub properties: BTreeMap<String, String>,
    /// Serialized body
    pub body: String,
}

impl RelayMessage {
    /// Create a JSON message tagged with a device's physical identifier.
    pub fn json(device_physical_id: &str, body: impl Into<String>) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert(
            PROPERTY_DEVICE_PHYSICAL_ID.to_string(),
            device_physical_id.to_string(),
        );
        Self {
            message_id: Uuid::new_v4(),
            content_type: CONTENT_TYPE_JSON.to_string(),
            content_encoding: CONTENT_ENCODING_UTF8.to_string(),
            properties,
            body: body.into(),
        }
    }

    /// The `device_physical_id` property.
    pub fn device_physical_id(&self) -> Option<&str> {
        self.properties
            .get(PROPERTY_DEVICE_PHYSICAL_ID)
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile() -> ProvisioningProfile {
        ProvisioningProfile {
            id_scope: "0ne000".into(),
            device_id: "dev-1".into(),
            primary_key: "key==".into(),
            device_template_id: "urn:tmpl:1".into(),
            device_physical_id: "phys-1".into(),
        }
    }

    #[test]
    fn payload_carries_profile_and_protocol_zero() {
        let request = ProvisioningRequest::new(
            "edgeIdentityTranslation",
            "provision_leaf_device",
            ProvisioningPayload::from_profile(&profile()),
        );
        let value = request.payload_json().unwrap();
        assert_eq!(
            value,
            json!({
                "id_scope": "0ne000",
                "device_id": "dev-1",
                "primary_key": "key==",
                "device_template_id": "urn:tmpl:1",
                "device_physical_id": "phys-1",
                "protocol": 0
            })
        );
    }

    #[test]
    fn response_error_message() {
        let response = MethodResponse::with_status(500, Some(json!({"error": "no quota"})));
        assert!(!response.is_success());
        assert_eq!(response.error_message().as_deref(), Some("no quota"));

        let ok = MethodResponse::ok();
        assert!(ok.is_success());
        assert!(ok.error_message().is_none());
    }

    #[test]
    fn relay_message_tags() {
        let message = RelayMessage::json("phys-1", "{}");
        assert_eq!(message.content_type, "application/json");
        assert_eq!(message.content_encoding, "utf-8");
        assert_eq!(message.device_physical_id(), Some("phys-1"));
        assert_eq!(message.message_id.get_version_num(), 4);
    }

    #[test]
    fn relay_message_ids_are_unique() {
        let a = RelayMessage::json("phys-1", "{}");
        let b = RelayMessage::json("phys-1", "{}");
        assert_ne!(a.message_id, b.message_id);
    }
}
