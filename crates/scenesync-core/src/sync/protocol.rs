//! Wire messages exchanged with the front-end peer
//!
//! Each message is a JSON header plus zero or more raw binary buffers sent
//! out-of-band. Typed arrays never appear inside the JSON: the header lists
//! one [`Attachment`] per array field, and `buffers[i]` carries the bytes of
//! `binary_attachments[i]`.
//!
//! ## Message Flow
//!
//! ```text
//! Host                                 Peer
//!   |                                    |
//!   |--- handshake {type, full state} -->|   (Unopened -> Open)
//!   |                                    |   (peer builds its mirror)
//!   |--- update {changed fields} ------->|   (one per flush)
//!   |<-- update {changed fields} --------|   (peer-side edits)
//!   |                                    |
//!   |--- teardown {reason} ------------->|   (Open/Closing -> Closed)
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::array::DType;
use crate::error::SyncResult;
use crate::types::ObjectId;

/// Metadata for one out-of-band array buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Field the array belongs to
    pub name: String,
    pub dtype: DType,
    pub shape: Vec<usize>,
    pub byte_length: usize,
}

/// JSON header of a wire message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum WireMessage {
    /// Sent once when a session opens, so the peer can construct its mirror
    Handshake {
        #[serde(with = "reference_token")]
        object_identity: ObjectId,
        /// Peer-side model type (e.g. `MeshModel`)
        type_name: String,
        full_initial_state: Map<String, JsonValue>,
        #[serde(default)]
        binary_attachments: Vec<Attachment>,
    },

    /// Changed fields, in either direction
    Update {
        #[serde(with = "reference_token")]
        object_identity: ObjectId,
        changed_fields: Map<String, JsonValue>,
        #[serde(default)]
        binary_attachments: Vec<Attachment>,
    },

    /// Sent when the session closes
    Teardown {
        #[serde(with = "reference_token")]
        object_identity: ObjectId,
        reason: String,
    },
}

impl WireMessage {
    /// Get the object this message is about
    pub fn object_id(&self) -> ObjectId {
        match self {
            WireMessage::Handshake {
                object_identity, ..
            }
            | WireMessage::Update {
                object_identity, ..
            }
            | WireMessage::Teardown {
                object_identity, ..
            } => *object_identity,
        }
    }

    /// Structured fields carried by this message (state for a handshake,
    /// changes for an update)
    pub fn fields(&self) -> Option<&Map<String, JsonValue>> {
        match self {
            WireMessage::Handshake {
                full_initial_state, ..
            } => Some(full_initial_state),
            WireMessage::Update { changed_fields, .. } => Some(changed_fields),
            WireMessage::Teardown { .. } => None,
        }
    }

    pub fn attachments(&self) -> &[Attachment] {
        match self {
            WireMessage::Handshake {
                binary_attachments, ..
            }
            | WireMessage::Update {
                binary_attachments, ..
            } => binary_attachments,
            WireMessage::Teardown { .. } => &[],
        }
    }

    /// Names of every field carried, structured and binary
    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .fields()
            .map(|f| f.keys().cloned().collect())
            .unwrap_or_default();
        names.extend(self.attachments().iter().map(|a| a.name.clone()));
        names
    }

    /// Check if this is a handshake message
    pub fn is_handshake(&self) -> bool {
        matches!(self, WireMessage::Handshake { .. })
    }

    /// Check if this is an update message
    pub fn is_update(&self) -> bool {
        matches!(self, WireMessage::Update { .. })
    }

    /// Check if this is a teardown message
    pub fn is_teardown(&self) -> bool {
        matches!(self, WireMessage::Teardown { .. })
    }

    pub fn to_json(&self) -> SyncResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(header: &str) -> SyncResult<Self> {
        Ok(serde_json::from_str(header)?)
    }
}

/// A header plus its out-of-band buffers
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub message: WireMessage,
    pub buffers: Vec<Bytes>,
}

impl Envelope {
    /// Envelope without binary buffers
    pub fn new(message: WireMessage) -> Self {
        Self {
            message,
            buffers: Vec::new(),
        }
    }

    pub fn with_buffers(message: WireMessage, buffers: Vec<Bytes>) -> Self {
        Self { message, buffers }
    }

    /// Rebuild an envelope from a received JSON header and buffers
    pub fn from_parts(header: &str, buffers: Vec<Bytes>) -> SyncResult<Self> {
        Ok(Self {
            message: WireMessage::from_json(header)?,
            buffers,
        })
    }

    pub fn object_id(&self) -> ObjectId {
        self.message.object_id()
    }

    /// Total size of the binary payload in bytes
    pub fn payload_len(&self) -> usize {
        self.buffers.iter().map(Bytes::len).sum()
    }
}

/// Serializes an [`ObjectId`] as its `IPY_MODEL_` reference token.
pub(crate) mod reference_token {
    use serde::{de, Deserialize, Deserializer, Serializer};

    use crate::types::ObjectId;

    pub fn serialize<S: Serializer>(id: &ObjectId, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&id.to_token())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ObjectId, D::Error> {
        let token = String::deserialize(deserializer)?;
        ObjectId::from_token(&token)
            .ok_or_else(|| de::Error::custom(format!("invalid reference token '{}'", token)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_header_shape() {
        let id = ObjectId::new();
        let mut changed = Map::new();
        changed.insert("side".into(), json!("DoubleSide"));
        let msg = WireMessage::Update {
            object_identity: id,
            changed_fields: changed,
            binary_attachments: vec![Attachment {
                name: "vertices".into(),
                dtype: DType::Float32,
                shape: vec![2, 3],
                byte_length: 24,
            }],
        };

        let header: JsonValue = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(header["method"], "update");
        assert_eq!(header["objectIdentity"], json!(id.to_token()));
        assert_eq!(header["changedFields"]["side"], "DoubleSide");
        assert_eq!(header["binaryAttachments"][0]["dtype"], "float32");
        assert_eq!(header["binaryAttachments"][0]["byteLength"], 24);
    }

    #[test]
    fn test_handshake_roundtrip() {
        let id = ObjectId::new();
        let msg = WireMessage::Handshake {
            object_identity: id,
            type_name: "MeshModel".into(),
            full_initial_state: Map::new(),
            binary_attachments: vec![],
        };

        let decoded = WireMessage::from_json(&msg.to_json().unwrap()).unwrap();
        assert_eq!(decoded, msg);
        assert!(decoded.is_handshake());
        assert_eq!(decoded.object_id(), id);
    }

    #[test]
    fn test_teardown_has_no_fields() {
        let msg = WireMessage::Teardown {
            object_identity: ObjectId::new(),
            reason: "closed".into(),
        };
        assert!(msg.is_teardown());
        assert!(msg.fields().is_none());
        assert!(msg.attachments().is_empty());
    }

    #[test]
    fn test_invalid_identity_is_serialization_error() {
        let header = r#"{"method":"teardown","objectIdentity":"mesh-1","reason":"x"}"#;
        assert!(matches!(
            WireMessage::from_json(header),
            Err(crate::SyncError::Serialization(_))
        ));
    }

    #[test]
    fn test_missing_attachments_default_to_empty() {
        let id = ObjectId::new();
        let header = format!(
            r#"{{"method":"update","objectIdentity":"{}","changedFields":{{"visible":false}}}}"#,
            id.to_token()
        );
        let envelope = Envelope::from_parts(&header, vec![]).unwrap();
        assert!(envelope.message.is_update());
        assert_eq!(envelope.message.field_names(), vec!["visible".to_string()]);
        assert_eq!(envelope.payload_len(), 0);
    }
}
