//! Edge case tests
//!
//! Rejected writes, malformed inbound messages and every error kind the
//! sync layer reports. A rejected operation must leave the target exactly
//! as it was.

use std::sync::{Arc, Barrier};
use std::thread;

use bytes::Bytes;
use scenesync_core::{
    Attachment, DType, Envelope, ObjectGraph, SessionState, SyncError, SyncEvent, SyncObject,
    TypedArray, Value, WireMessage,
};
use serde_json::{json, Map};
use tokio::sync::mpsc;

fn open(obj: &SyncObject) -> mpsc::UnboundedReceiver<Envelope> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    obj.open(Arc::new(tx)).unwrap();
    rx.try_recv().unwrap();
    rx
}

fn update(target: &SyncObject, fields: serde_json::Value) -> Envelope {
    let changed: Map<String, serde_json::Value> = match fields {
        serde_json::Value::Object(map) => map,
        other => panic!("expected object, got {}", other),
    };
    Envelope::new(WireMessage::Update {
        object_identity: target.id().unwrap(),
        changed_fields: changed,
        binary_attachments: vec![],
    })
}

// ============================================================================
// Rejected Local Writes
// ============================================================================

/// A (5, 4) array does not fit a (None, 3) field and leaves it unchanged
#[test]
fn test_wrong_array_shape_is_rejected() {
    let graph = ObjectGraph::new();
    let geometry = graph.create("PlainBufferGeometry").unwrap();
    let before = geometry.get("vertices").unwrap();

    let wide = TypedArray::from_vec(vec![5, 4], vec![0.0f32; 20]).unwrap();
    let err = geometry.set("vertices", wide).unwrap_err();
    assert_eq!(
        err,
        SyncError::ShapeMismatch {
            field: "vertices".into(),
            expected: "(None, 3)".into(),
            actual: vec![5, 4],
        }
    );
    assert_eq!(geometry.get("vertices").unwrap(), before);
}

/// A two element list does not fit a 3-vector
#[test]
fn test_short_vector_is_rejected() {
    let graph = ObjectGraph::new();
    let mesh = graph.create("Mesh").unwrap();
    let err = mesh.set("position", [1.0, 2.0]).unwrap_err();
    assert_eq!(
        err,
        SyncError::LengthMismatch {
            field: "position".into(),
            expected: 3,
            actual: 2,
        }
    );
    assert_eq!(mesh.get("position").unwrap(), Value::from([0.0, 0.0, 0.0]));
}

/// Closing a reference cycle fails and neither side's references change
#[test]
fn test_cycle_leaves_both_reference_sets_unchanged() {
    let graph = ObjectGraph::new();
    let outer = graph.create("Scene").unwrap();
    let inner = graph.create("Scene").unwrap();
    graph.register(&outer).unwrap();
    graph.register(&inner).unwrap();
    outer.set("children", vec![inner.clone()]).unwrap();

    let err = inner.set("children", vec![outer.clone()]).unwrap_err();
    assert!(matches!(err, SyncError::CyclicReference { ref field, .. } if field == "children"));
    assert_eq!(outer.references(), vec![inner.clone()]);
    assert!(inner.references().is_empty());

    // Self reference is a cycle too
    assert!(matches!(
        outer.set("children", vec![outer.clone()]),
        Err(SyncError::CyclicReference { .. })
    ));
    assert_eq!(outer.references(), vec![inner]);
}

/// Two threads closing the same cycle from opposite ends: exactly one wins
#[test]
fn test_concurrent_reference_edits_cannot_close_a_cycle() {
    for _ in 0..200 {
        let graph = ObjectGraph::new();
        let a = graph.create("Scene").unwrap();
        let b = graph.create("Scene").unwrap();
        graph.register(&a).unwrap();
        graph.register(&b).unwrap();

        let barrier = Barrier::new(2);
        let (first, second) = thread::scope(|s| {
            let first = s.spawn(|| {
                barrier.wait();
                a.set("children", vec![b.clone()])
            });
            let second = s.spawn(|| {
                barrier.wait();
                b.set("children", vec![a.clone()])
            });
            (first.join().unwrap(), second.join().unwrap())
        });

        assert_ne!(first.is_ok(), second.is_ok());
        let err = first.err().or(second.err()).unwrap();
        assert!(matches!(err, SyncError::CyclicReference { .. }));
        assert!(!(a.references().contains(&b) && b.references().contains(&a)));
    }
}

/// A reference field only accepts types providing its capability
#[test]
fn test_reference_capability_is_checked() {
    let graph = ObjectGraph::new();
    let geometry = graph.create("BoxGeometry").unwrap();
    graph.register(&geometry).unwrap();

    let grid = graph.create("SurfaceGrid").unwrap();
    assert!(matches!(
        grid.set("geometry", &geometry),
        Err(SyncError::TypeMismatch { .. })
    ));

    let renderer = graph.create("Renderer").unwrap();
    let mesh = graph.create("Mesh").unwrap();
    graph.register(&mesh).unwrap();
    assert!(matches!(
        renderer.set("scene", &mesh),
        Err(SyncError::TypeMismatch { .. })
    ));
    assert!(matches!(
        renderer.set("scene", Value::Null),
        Err(SyncError::TypeMismatch { .. })
    ));
}

/// Bounded numeric fields reject out-of-range values
#[test]
fn test_out_of_range_opacity() {
    let graph = ObjectGraph::new();
    let material = graph.create("MeshLambertMaterial").unwrap();
    assert!(matches!(
        material.set("opacity", 1.5),
        Err(SyncError::OutOfRange { .. })
    ));
    assert!(matches!(
        material.set("opacity", f64::NAN),
        Err(SyncError::OutOfRange { .. })
    ));
    assert_eq!(material.get("opacity").unwrap(), Value::Float(1.0));
}

/// Colors are checked against the CSS color forms
#[test]
fn test_invalid_color_is_domain_error() {
    let graph = ObjectGraph::new();
    let light = graph.create("AmbientLight").unwrap();
    assert!(matches!(
        light.set("color", "#12345"),
        Err(SyncError::DomainError { ref domain, .. }) if domain == "color"
    ));
    assert!(matches!(
        light.set("color", Value::Null),
        Err(SyncError::TypeMismatch { .. })
    ));
    light.set("color", "rgb(10, 20, 30)").unwrap();
}

/// An enum field given a non-string is a type mismatch, not a domain error
#[test]
fn test_enum_requires_string() {
    let graph = ObjectGraph::new();
    let material = graph.create("MeshLambertMaterial").unwrap();
    assert!(matches!(
        material.set("side", 2),
        Err(SyncError::TypeMismatch { .. })
    ));
}

/// Ragged nested lists cannot become arrays
#[test]
fn test_ragged_vertices() {
    let graph = ObjectGraph::new();
    let geometry = graph.create("PlainBufferGeometry").unwrap();
    let ragged = Value::List(vec![
        Value::from(vec![0.0, 0.0, 0.0]),
        Value::from(vec![1.0, 0.0]),
    ]);
    assert!(matches!(
        geometry.set("vertices", ragged),
        Err(SyncError::ShapeMismatch { .. })
    ));
}

/// Negative indices cannot be stored as uint32 faces
#[test]
fn test_negative_face_index() {
    let graph = ObjectGraph::new();
    let geometry = graph.create("PlainBufferGeometry").unwrap();
    assert!(matches!(
        geometry.set("faces", Value::from(vec![vec![0, -1, 2]])),
        Err(SyncError::TypeMismatch { .. })
    ));
}

#[test]
fn test_unknown_type_and_field() {
    let graph = ObjectGraph::new();
    assert_eq!(
        graph.create("Teapot").unwrap_err(),
        SyncError::UnknownType("Teapot".into())
    );
    let mesh = graph.create("Mesh").unwrap();
    assert!(matches!(
        mesh.set("spout", true),
        Err(SyncError::UnknownField { .. })
    ));
}

/// Objects outlive their graph only as inert handles
#[test]
fn test_dropped_graph() {
    let graph = ObjectGraph::new();
    let mesh = graph.create("Mesh").unwrap();
    drop(graph);

    // Plain fields still accept writes
    mesh.set("name", "orphan").unwrap();
    let (tx, _rx) = mpsc::unbounded_channel::<Envelope>();
    assert!(matches!(
        mesh.open(Arc::new(tx)),
        Err(SyncError::InvalidState(_))
    ));
}

// ============================================================================
// Malformed Inbound Messages
// ============================================================================

/// Attachment byte length disagrees with the buffer actually received
#[test]
fn test_attachment_length_mismatch() {
    let graph = ObjectGraph::new();
    let geometry = graph.create("PlainBufferGeometry").unwrap();
    let _rx = open(&geometry);
    let before = geometry.get("vertices").unwrap();

    let envelope = Envelope::with_buffers(
        WireMessage::Update {
            object_identity: geometry.id().unwrap(),
            changed_fields: Map::new(),
            binary_attachments: vec![Attachment {
                name: "vertices".into(),
                dtype: DType::Float32,
                shape: vec![3, 3],
                byte_length: 36,
            }],
        },
        vec![Bytes::from(vec![0u8; 30])],
    );
    assert_eq!(
        geometry.apply(&envelope).unwrap_err(),
        SyncError::BufferSizeMismatch {
            field: "vertices".into(),
            expected: 36,
            actual: 30,
        }
    );
    assert_eq!(geometry.get("vertices").unwrap(), before);
}

/// Buffer length agrees with the header but not with dtype x shape
#[test]
fn test_buffer_disagrees_with_shape() {
    let graph = ObjectGraph::new();
    let geometry = graph.create("PlainBufferGeometry").unwrap();
    let _rx = open(&geometry);

    let envelope = Envelope::with_buffers(
        WireMessage::Update {
            object_identity: geometry.id().unwrap(),
            changed_fields: Map::new(),
            binary_attachments: vec![Attachment {
                name: "vertices".into(),
                dtype: DType::Float32,
                shape: vec![3, 3],
                byte_length: 24,
            }],
        },
        vec![Bytes::from(vec![0u8; 24])],
    );
    assert!(matches!(
        geometry.apply(&envelope),
        Err(SyncError::BufferSizeMismatch {
            expected: 36,
            actual: 24,
            ..
        })
    ));
}

/// A peer shape whose byte size overflows is rejected, never trusted
#[test]
fn test_attachment_with_overflowing_shape() {
    let graph = ObjectGraph::new();
    let geometry = graph.create("PlainBufferGeometry").unwrap();
    let _rx = open(&geometry);
    let before = geometry.get("vertices").unwrap();

    let envelope = Envelope::with_buffers(
        WireMessage::Update {
            object_identity: geometry.id().unwrap(),
            changed_fields: Map::new(),
            binary_attachments: vec![Attachment {
                name: "vertices".into(),
                dtype: DType::Float32,
                shape: vec![1 << 62, 3],
                byte_length: 0,
            }],
        },
        vec![Bytes::new()],
    );
    assert!(matches!(
        geometry.apply(&envelope),
        Err(SyncError::BufferSizeMismatch {
            expected: usize::MAX,
            actual: 0,
            ..
        })
    ));
    assert_eq!(geometry.get("vertices").unwrap(), before);
    assert!(!geometry.is_dirty());
}

#[test]
fn test_attachment_without_buffer() {
    let graph = ObjectGraph::new();
    let geometry = graph.create("PlainBufferGeometry").unwrap();
    let _rx = open(&geometry);

    let envelope = Envelope::new(WireMessage::Update {
        object_identity: geometry.id().unwrap(),
        changed_fields: Map::new(),
        binary_attachments: vec![Attachment {
            name: "faces".into(),
            dtype: DType::Uint32,
            shape: vec![1, 3],
            byte_length: 12,
        }],
    });
    assert!(matches!(
        geometry.apply(&envelope),
        Err(SyncError::Serialization(_))
    ));
}

/// One bad field rejects the whole message
#[test]
fn test_inbound_update_is_all_or_nothing() {
    let graph = ObjectGraph::new();
    let camera = graph.create("PerspectiveCamera").unwrap();
    let _rx = open(&camera);

    let err = camera
        .apply(&update(&camera, json!({"fov": 60, "position": [1, 2]})))
        .unwrap_err();
    assert!(matches!(err, SyncError::LengthMismatch { .. }));
    assert_eq!(camera.get("fov").unwrap(), Value::Float(50.0));
}

/// Unknown inbound fields are skipped and reported; the rest applies
#[test]
fn test_unknown_inbound_field_is_reported() {
    let graph = ObjectGraph::new();
    let camera = graph.create("PerspectiveCamera").unwrap();
    let _rx = open(&camera);
    let mut events = graph.subscribe();

    let report = camera
        .apply(&update(&camera, json!({"fov": 60, "zoom": 2})))
        .unwrap();
    assert_eq!(report.applied, vec!["fov".to_string()]);
    assert_eq!(report.unknown, vec!["zoom".to_string()]);
    assert_eq!(camera.get("fov").unwrap(), Value::Float(60.0));

    assert_eq!(
        events.try_recv().unwrap(),
        SyncEvent::UnknownField {
            object_id: camera.id().unwrap(),
            field: "zoom".into()
        }
    );
}

/// A token naming no registered object fails the message
#[test]
fn test_unresolved_reference_token() {
    let graph = ObjectGraph::new();
    let picker = graph.create("Picker").unwrap();
    let _rx = open(&picker);

    let stranger = scenesync_core::ObjectId::new().to_token();
    assert!(matches!(
        picker.apply(&update(&picker, json!({"object": stranger}))),
        Err(SyncError::NotFound(_))
    ));
    assert!(matches!(
        picker.apply(&update(&picker, json!({"object": "not a token"}))),
        Err(SyncError::TypeMismatch { .. })
    ));
    assert_eq!(picker.get("object").unwrap(), Value::Null);
}

#[test]
fn test_inbound_update_after_close() {
    let graph = ObjectGraph::new();
    let camera = graph.create("PerspectiveCamera").unwrap();
    let _rx = open(&camera);
    camera.close("done").unwrap();

    assert!(matches!(
        camera.apply(&update(&camera, json!({"fov": 10}))),
        Err(SyncError::SessionClosed(_))
    ));
}

/// Headers with a malformed identity never decode
#[test]
fn test_bad_header() {
    let header = r#"{"method":"update","objectIdentity":"IPY_MODEL_nope","changedFields":{}}"#;
    assert!(matches!(
        Envelope::from_parts(header, vec![]),
        Err(SyncError::Serialization(_))
    ));
    assert!(Envelope::from_parts("{", vec![]).is_err());
}

// ============================================================================
// Outbound Encoding Edge Cases
// ============================================================================

/// Non-finite floats go out as JSON null
#[test]
fn test_non_finite_float_encodes_as_null() {
    let graph = ObjectGraph::new();
    let camera = graph.create("PerspectiveCamera").unwrap();
    let mut rx = open(&camera);

    camera.set("far", f64::INFINITY).unwrap();
    camera.flush().unwrap();
    let envelope = rx.try_recv().unwrap();
    assert_eq!(
        envelope.message.fields().unwrap()["far"],
        serde_json::Value::Null
    );
}

/// A write that narrows to the synchronized float32 values is not a change
#[test]
fn test_array_write_narrowing_to_synced_values_is_clean() {
    let graph = ObjectGraph::new();
    let geometry = graph.create("PlainBufferGeometry").unwrap();
    geometry
        .set(
            "vertices",
            TypedArray::from_vec(vec![1, 3], vec![0.5f32, 0.25, 0.125]).unwrap(),
        )
        .unwrap();
    let _rx = open(&geometry);

    geometry
        .set(
            "vertices",
            TypedArray::from_vec(vec![1, 3], vec![0.5f64 + 1e-9, 0.25, 0.125]).unwrap(),
        )
        .unwrap();
    assert!(!geometry.is_dirty());
    assert_eq!(geometry.session_state(), SessionState::Open);
}

/// Backpressure on open leaves the session unopened and retryable
#[test]
fn test_open_under_backpressure() {
    let graph = ObjectGraph::new();
    let (tx, mut rx) = mpsc::channel::<Envelope>(1);
    let tx = Arc::new(tx);
    let filler = graph.create("Scene").unwrap();
    filler.open(tx.clone()).unwrap();

    let mesh = graph.create("Mesh").unwrap();
    let err = mesh.open(tx.clone()).unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(mesh.session_state(), SessionState::Unopened);

    rx.try_recv().unwrap();
    mesh.open(tx).unwrap();
    assert_eq!(mesh.session_state(), SessionState::Open);
}
