//! Value <-> wire encoding
//!
//! Scalars, strings, enums, vectors, lists and dicts encode as literal JSON.
//! Object references encode as the held object's reference token and must
//! point at a registered object. Array fields leave the JSON entirely: each
//! becomes an [`Attachment`] plus a raw buffer.
//!
//! Decoding is all-or-nothing per message: every known field is converted
//! and validated before any of them is stored. Unknown fields are skipped
//! and reported.

use bytes::Bytes;
use serde_json::{Map, Number, Value as JsonValue};
use tracing::{debug, warn};

use crate::array::TypedArray;
use crate::coerce::{array_error, coerce};
use crate::error::{SyncError, SyncResult};
use crate::graph::ObjectGraph;
use crate::object::SyncObject;
use crate::schema::{FieldKind, TypeSchema};
use crate::sync::events::{SessionState, SyncEvent};
use crate::sync::protocol::{Attachment, Envelope, WireMessage};
use crate::types::ObjectId;
use crate::value::Value;

/// Fields of one outbound message, split into JSON and binary parts
#[derive(Debug, Default)]
pub(crate) struct EncodedFields {
    pub(crate) fields: Map<String, JsonValue>,
    pub(crate) attachments: Vec<Attachment>,
    pub(crate) buffers: Vec<Bytes>,
}

/// What an inbound message did to its target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Fields stored on the target
    pub applied: Vec<String>,
    /// Fields the target's type does not declare (ignored)
    pub unknown: Vec<String>,
}

/// Encode the given field indices of `values`.
pub(crate) fn encode_fields(
    graph: &ObjectGraph,
    schema: &TypeSchema,
    values: &[Value],
    indices: &[usize],
) -> SyncResult<EncodedFields> {
    let mut out = EncodedFields::default();
    for &index in indices {
        let Some(field) = schema.field_at(index) else {
            continue;
        };
        match &values[index] {
            Value::Array(arr) if field.kind.is_array() => {
                out.attachments.push(Attachment {
                    name: field.name.to_string(),
                    dtype: arr.dtype(),
                    shape: arr.shape().to_vec(),
                    byte_length: arr.byte_len(),
                });
                out.buffers.push(arr.to_bytes());
            }
            value => {
                let json = encode_value(graph, field.name, value)?;
                out.fields.insert(field.name.to_string(), json);
            }
        }
    }
    Ok(out)
}

/// Encode one value as JSON. Non-finite floats become `null`.
pub fn encode_value(graph: &ObjectGraph, field: &str, value: &Value) -> SyncResult<JsonValue> {
    Ok(match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Int(i) => JsonValue::Number((*i).into()),
        Value::Float(f) => Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number),
        Value::Str(s) => JsonValue::String(s.clone()),
        Value::List(items) => JsonValue::Array(
            items
                .iter()
                .map(|item| encode_value(graph, field, item))
                .collect::<SyncResult<_>>()?,
        ),
        Value::Dict(map) => JsonValue::Object(
            map.iter()
                .map(|(k, v)| Ok::<_, SyncError>((k.clone(), encode_value(graph, field, v)?)))
                .collect::<SyncResult<_>>()?,
        ),
        Value::Object(obj) => match obj.id() {
            Some(id) if graph.contains(id) => JsonValue::String(id.to_token()),
            _ => {
                return Err(SyncError::UnregisteredReference {
                    field: field.to_string(),
                    type_name: obj.type_name().to_string(),
                })
            }
        },
        Value::Array(arr) => JsonValue::Array(
            arr.to_f64_vec()
                .into_iter()
                .map(|x| Number::from_f64(x).map_or(JsonValue::Null, JsonValue::Number))
                .collect(),
        ),
    })
}

/// Encode the complete state of a registered object as one update.
pub fn encode(object: &SyncObject) -> SyncResult<Envelope> {
    let graph = object.require_graph()?;
    let object_id = object
        .id()
        .ok_or_else(|| SyncError::InvalidState(format!("{} is not registered", object.label())))?;

    let state = object.lock();
    let all: Vec<usize> = (0..state.values.len()).collect();
    let encoded = encode_fields(&graph, object.schema(), &state.values, &all)?;
    Ok(Envelope::with_buffers(
        WireMessage::Update {
            object_identity: object_id,
            changed_fields: encoded.fields,
            binary_attachments: encoded.attachments,
        },
        encoded.buffers,
    ))
}

/// Decode the fields of `envelope` into `target`.
///
/// The envelope's identity is not checked here; [`SyncObject::apply`] does
/// that before delegating.
pub fn decode(envelope: &Envelope, target: &SyncObject) -> SyncResult<ApplyReport> {
    let graph = target.require_graph()?;
    let schema = target.schema();
    let message = &envelope.message;
    let attachments = message.attachments();
    if attachments.len() != envelope.buffers.len() {
        return Err(SyncError::Serialization(format!(
            "{} attachments but {} buffers",
            attachments.len(),
            envelope.buffers.len()
        )));
    }

    let mut report = ApplyReport::default();
    let mut decoded: Vec<(usize, Value)> = Vec::new();
    // Held from the first reference check until the values are stored.
    let mut reference_edit = None;

    for (name, json) in message.fields().into_iter().flatten() {
        let Some(index) = schema.index_of(name) else {
            report.unknown.push(name.clone());
            continue;
        };
        let Some(field) = schema.field_at(index) else {
            continue;
        };
        let raw = decode_value(&graph, field.name, &field.kind, json)?;
        let value = coerce(field, raw)?;
        if field.kind.holds_references() {
            reference_edit.get_or_insert_with(|| graph.lock_reference_edits());
            graph.validate_references(target, field.name, &value)?;
        }
        decoded.push((index, value));
    }

    for (attachment, buffer) in attachments.iter().zip(&envelope.buffers) {
        let Some(index) = schema.index_of(&attachment.name) else {
            report.unknown.push(attachment.name.clone());
            continue;
        };
        let Some(field) = schema.field_at(index) else {
            continue;
        };
        if attachment.byte_length != buffer.len() {
            return Err(SyncError::BufferSizeMismatch {
                field: field.name.to_string(),
                expected: attachment.byte_length,
                actual: buffer.len(),
            });
        }
        let arr = TypedArray::from_bytes(attachment.dtype, attachment.shape.clone(), buffer)
            .map_err(|e| array_error(field.name, e))?;
        decoded.push((index, coerce(field, Value::Array(arr))?));
    }

    if !report.unknown.is_empty() {
        warn!(object = %target.label(), fields = ?report.unknown, "Ignoring unknown inbound fields");
        if let Some(object_id) = target.id() {
            for field in &report.unknown {
                graph.emit(SyncEvent::UnknownField {
                    object_id,
                    field: field.clone(),
                });
            }
        }
    }

    let mut state = target.lock();
    if state.session.state() == SessionState::Closed {
        return Err(SyncError::SessionClosed(target.label()));
    }
    for (index, value) in decoded {
        state.session.accept_inbound(index, &value);
        state.values[index] = value;
        if let Some(field) = schema.field_at(index) {
            report.applied.push(field.name.to_string());
        }
    }
    drop(state);
    drop(reference_edit);

    debug!(object = %target.label(), applied = ?report.applied, "Applied inbound update");
    Ok(report)
}

/// Convert inbound JSON to a raw value, resolving reference tokens where the
/// field kind expects objects.
fn decode_value(
    graph: &ObjectGraph,
    field: &str,
    kind: &FieldKind,
    json: &JsonValue,
) -> SyncResult<Value> {
    match (kind, json) {
        (FieldKind::Object { .. }, JsonValue::String(token)) => {
            let id = ObjectId::from_token(token).ok_or_else(|| {
                SyncError::type_mismatch(field, "reference token", format!("str '{}'", token))
            })?;
            Ok(Value::Object(graph.resolve(id)?))
        }
        (FieldKind::List(element), JsonValue::Array(items))
        | (FieldKind::Vector { element, .. }, JsonValue::Array(items)) => items
            .iter()
            .map(|item| decode_value(graph, field, element, item))
            .collect::<SyncResult<Vec<_>>>()
            .map(Value::List),
        (_, json) => Ok(plain_value(json)),
    }
}

fn plain_value(json: &JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(s) => Value::Str(s.clone()),
        JsonValue::Array(items) => Value::List(items.iter().map(plain_value).collect()),
        JsonValue::Object(map) => Value::Dict(
            map.iter()
                .map(|(k, v)| (k.clone(), plain_value(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::DType;
    use serde_json::json;

    fn registered(graph: &ObjectGraph, type_name: &str) -> SyncObject {
        let obj = graph.create(type_name).unwrap();
        graph.register(&obj).unwrap();
        obj
    }

    #[test]
    fn test_references_encode_as_tokens() {
        let graph = ObjectGraph::new();
        let geometry = registered(&graph, "BoxGeometry");
        let mesh = registered(&graph, "Mesh");
        mesh.set("geometry", &geometry).unwrap();

        let envelope = encode(&mesh).unwrap();
        let fields = envelope.message.fields().unwrap();
        assert_eq!(fields["geometry"], json!(geometry.id().unwrap().to_token()));
        assert_eq!(fields["material"], JsonValue::Null);
    }

    #[test]
    fn test_arrays_travel_out_of_band() {
        let graph = ObjectGraph::new();
        let geom = registered(&graph, "PlainBufferGeometry");
        let vertices = TypedArray::from_vec(vec![2, 3], vec![0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0]).unwrap();
        geom.set("vertices", vertices).unwrap();

        let envelope = encode(&geom).unwrap();
        let fields = envelope.message.fields().unwrap();
        assert!(!fields.contains_key("vertices"));

        let attachments = envelope.message.attachments();
        let index = attachments.iter().position(|a| a.name == "vertices").unwrap();
        assert_eq!(attachments[index].dtype, DType::Float32);
        assert_eq!(attachments[index].shape, vec![2, 3]);
        assert_eq!(attachments[index].byte_length, 24);
        assert_eq!(envelope.buffers[index].len(), 24);
    }

    #[test]
    fn test_decode_rejects_short_buffer() {
        let graph = ObjectGraph::new();
        let geom = registered(&graph, "PlainBufferGeometry");
        let envelope = Envelope::with_buffers(
            WireMessage::Update {
                object_identity: geom.id().unwrap(),
                changed_fields: Map::new(),
                binary_attachments: vec![Attachment {
                    name: "vertices".into(),
                    dtype: DType::Float32,
                    shape: vec![4, 3],
                    byte_length: 40,
                }],
            },
            vec![Bytes::from(vec![0u8; 40])],
        );

        assert_eq!(
            decode(&envelope, &geom),
            Err(SyncError::BufferSizeMismatch {
                field: "vertices".into(),
                expected: 48,
                actual: 40
            })
        );
    }

    #[test]
    fn test_decode_is_atomic() {
        let graph = ObjectGraph::new();
        let mesh = registered(&graph, "Mesh");
        let mut changed = Map::new();
        changed.insert("name".into(), json!("renamed"));
        changed.insert("position".into(), json!([1.0, 2.0]));
        let envelope = Envelope::new(WireMessage::Update {
            object_identity: mesh.id().unwrap(),
            changed_fields: changed,
            binary_attachments: vec![],
        });

        assert!(matches!(
            decode(&envelope, &mesh),
            Err(SyncError::LengthMismatch { .. })
        ));
        assert_eq!(mesh.get("name").unwrap(), Value::from(""));
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let graph = ObjectGraph::new();
        let mesh = registered(&graph, "Mesh");
        let mut events = graph.subscribe();
        let mut changed = Map::new();
        changed.insert("visible".into(), json!(false));
        changed.insert("sparkle".into(), json!(11));
        let envelope = Envelope::new(WireMessage::Update {
            object_identity: mesh.id().unwrap(),
            changed_fields: changed,
            binary_attachments: vec![],
        });

        let report = decode(&envelope, &mesh).unwrap();
        assert_eq!(report.applied, vec!["visible".to_string()]);
        assert_eq!(report.unknown, vec!["sparkle".to_string()]);
        assert_eq!(mesh.get("visible").unwrap(), Value::Bool(false));
        assert_eq!(
            events.try_recv().unwrap(),
            SyncEvent::UnknownField {
                object_id: mesh.id().unwrap(),
                field: "sparkle".into()
            }
        );
    }

    #[test]
    fn test_decode_unknown_token_is_not_found() {
        let graph = ObjectGraph::new();
        let mesh = registered(&graph, "Mesh");
        let mut changed = Map::new();
        changed.insert("geometry".into(), json!(ObjectId::new().to_token()));
        let envelope = Envelope::new(WireMessage::Update {
            object_identity: mesh.id().unwrap(),
            changed_fields: changed,
            binary_attachments: vec![],
        });
        assert!(matches!(decode(&envelope, &mesh), Err(SyncError::NotFound(_))));
    }

    #[test]
    fn test_non_finite_float_encodes_as_null() {
        let graph = ObjectGraph::new();
        assert_eq!(
            encode_value(&graph, "x", &Value::Float(f64::INFINITY)).unwrap(),
            JsonValue::Null
        );
    }
}
