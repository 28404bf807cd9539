//! Payload handed to an invoked function.

use serde::{Deserialize, Serialize};

use crate::types::FieldMap;

/// JSON snapshot of a store record at dispatch time.
///
/// Serializes as `{"id": <key>, "obj_name": <key>, "body": <json string>}`
/// where `body` is the record's field map encoded as a JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchEnvelope {
    pub id: String,
    #[serde(rename = "obj_name")]
    pub object_name: String,
    pub body: String,
}

impl DispatchEnvelope {
    /// Builds the envelope for `key` from a freshly read field map.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the field map cannot be encoded.
    pub fn from_record(key: &str, fields: &FieldMap) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: key.to_string(),
            object_name: key.to_string(),
            body: serde_json::to_string(fields)?,
        })
    }

    /// Encodes the envelope as the invocation payload.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
