//! Synchronized objects
//!
//! A [`SyncObject`] is a cheap, cloneable handle to one instance of a schema
//! type. Its field values, last-synchronized snapshot, dirty set and session
//! state sit behind a single mutex so that local writes, flushes and inbound
//! applies never interleave.
//!
//! Lock order: the graph's reference-edit lock, then an object's state lock,
//! then the graph's registry lock. Never the reverse, and no code path holds
//! two object locks at once.

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::coerce::coerce;
use crate::config::FlushPolicy;
use crate::error::{SyncError, SyncResult};
use crate::graph::{GraphInner, ObjectGraph};
use crate::schema::{FieldDescriptor, TypeSchema};
use crate::sync::events::SessionState;
use crate::sync::session::Session;
use crate::types::ObjectId;
use crate::value::Value;

/// Handle to a synchronized object. Clones share the same instance;
/// equality is identity.
#[derive(Clone)]
pub struct SyncObject {
    pub(crate) inner: Arc<ObjectInner>,
}

pub(crate) struct ObjectInner {
    pub(crate) schema: Arc<TypeSchema>,
    pub(crate) graph: Weak<GraphInner>,
    pub(crate) id: OnceLock<ObjectId>,
    pub(crate) state: Mutex<ObjectState>,
}

/// Everything guarded by the object's lock
pub(crate) struct ObjectState {
    /// Current values, indexed like the schema's fields
    pub(crate) values: Vec<Value>,
    pub(crate) session: Session,
}

impl SyncObject {
    pub(crate) fn new(schema: Arc<TypeSchema>, graph: Weak<GraphInner>) -> Self {
        let values: Vec<Value> = schema.fields().map(|f| f.default.clone()).collect();
        let session = Session::new(values.clone());
        Self {
            inner: Arc::new(ObjectInner {
                schema,
                graph,
                id: OnceLock::new(),
                state: Mutex::new(ObjectState { values, session }),
            }),
        }
    }

    /// Identity, once registered
    pub fn id(&self) -> Option<ObjectId> {
        self.inner.id.get().copied()
    }

    pub fn type_name(&self) -> &'static str {
        self.inner.schema.name()
    }

    pub fn schema(&self) -> &Arc<TypeSchema> {
        &self.inner.schema
    }

    /// The graph this object was created in, if it is still alive
    pub fn graph(&self) -> Option<ObjectGraph> {
        self.inner.graph.upgrade().map(ObjectGraph::from_inner)
    }

    pub(crate) fn require_graph(&self) -> SyncResult<ObjectGraph> {
        self.graph()
            .ok_or_else(|| SyncError::InvalidState(format!("graph of {} was dropped", self.label())))
    }

    pub fn ptr_eq(&self, other: &SyncObject) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Identity for messages: the id when registered, the type otherwise
    pub fn label(&self) -> String {
        match self.id() {
            Some(id) => id.to_string(),
            None => format!("unregistered {}", self.type_name()),
        }
    }

    /// Stable address of the shared instance, for visited sets
    pub(crate) fn key(&self) -> *const ObjectInner {
        Arc::as_ptr(&self.inner)
    }

    /// Strong handles to this object, including the graph's own
    pub(crate) fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ObjectState> {
        self.inner.state.lock()
    }

    fn field(&self, name: &str) -> SyncResult<(usize, &FieldDescriptor)> {
        let schema = &self.inner.schema;
        schema
            .index_of(name)
            .and_then(|index| schema.field_at(index).map(|field| (index, field)))
            .ok_or_else(|| SyncError::UnknownField {
                type_name: schema.name().to_string(),
                field: name.to_string(),
            })
    }

    /// Current value of a field
    pub fn get(&self, name: &str) -> SyncResult<Value> {
        let (index, _) = self.field(name)?;
        Ok(self.lock().values[index].clone())
    }

    /// Every field with its current value, in declaration order
    pub fn values(&self) -> Vec<(&'static str, Value)> {
        let state = self.lock();
        self.inner
            .schema
            .fields()
            .map(|f| f.name)
            .zip(state.values.iter().cloned())
            .collect()
    }

    /// Assign a field.
    ///
    /// The value is validated and normalized first; on any error the object
    /// is left unchanged. Writes to an open session mark the field dirty
    /// (or flush immediately under [`FlushPolicy::Eager`]).
    pub fn set(&self, name: &str, raw: impl Into<Value>) -> SyncResult<()> {
        let (index, field) = self.field(name)?;
        let value = coerce(field, raw.into())?;

        let graph = self.graph();
        let reference_graph = if field.kind.holds_references() {
            Some(self.require_graph()?)
        } else {
            None
        };
        let _reference_edit = match reference_graph.as_ref() {
            Some(graph) => {
                let guard = graph.lock_reference_edits();
                graph.validate_references(self, field.name, &value)?;
                Some(guard)
            }
            None => None,
        };

        let mut state = self.lock();
        if !state.session.state().accepts_writes() {
            return Err(SyncError::SessionClosed(self.label()));
        }

        state.values[index] = value;
        let ObjectState { values, session } = &mut *state;
        session.track(index, &values[index]);

        let eager = graph
            .as_ref()
            .is_some_and(|g| g.config().flush_policy == FlushPolicy::Eager);
        if eager && state.session.state() == SessionState::Open {
            if let Some(graph) = graph.as_ref() {
                if let Err(err) = self.flush_locked(graph, &mut state) {
                    // Already reported to observers; the field stays dirty.
                    warn!(object = %self.label(), field = name, error = %err, "Eager flush failed");
                }
            }
        }
        debug!(object = %self.label(), field = name, "Field set");
        Ok(())
    }

    /// Assign several fields, stopping at the first error.
    pub fn set_many<'a, I, V>(&self, fields: I) -> SyncResult<()>
    where
        I: IntoIterator<Item = (&'a str, V)>,
        V: Into<Value>,
    {
        fields
            .into_iter()
            .try_for_each(|(name, value)| self.set(name, value))
    }

    pub fn session_state(&self) -> SessionState {
        self.lock().session.state()
    }

    /// Fields changed locally since the last successful flush
    pub fn dirty_fields(&self) -> Vec<&'static str> {
        let state = self.lock();
        state
            .session
            .dirty()
            .filter_map(|index| self.inner.schema.field_at(index).map(|f| f.name))
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().session.has_dirty()
    }

    /// Objects directly held by this object's reference fields
    pub fn references(&self) -> Vec<SyncObject> {
        let state = self.lock();
        let mut held = Vec::new();
        for (field, value) in self.inner.schema.fields().zip(&state.values) {
            if field.kind.holds_references() {
                value.referenced_objects(&mut held);
            }
        }
        drop(state);

        let mut unique: Vec<SyncObject> = Vec::with_capacity(held.len());
        for obj in held {
            if !unique.iter().any(|seen| seen.ptr_eq(&obj)) {
                unique.push(obj);
            }
        }
        unique
    }
}

impl PartialEq for SyncObject {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for SyncObject {
    // Never takes the state lock.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncObject")
            .field("type", &self.type_name())
            .field("id", &self.id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ObjectGraph;

    #[test]
    fn test_new_object_has_defaults() {
        let graph = ObjectGraph::new();
        let light = graph.create("DirectionalLight").unwrap();
        assert_eq!(light.get("position").unwrap(), Value::from([0.0, 1.0, 0.0]));
        assert_eq!(light.get("color").unwrap(), Value::from("#ffffff"));
        assert!(light.id().is_none());
        assert_eq!(light.session_state(), SessionState::Unopened);
    }

    #[test]
    fn test_unknown_field() {
        let graph = ObjectGraph::new();
        let mesh = graph.create("Mesh").unwrap();
        assert_eq!(
            mesh.set("teapot", 1),
            Err(SyncError::UnknownField {
                type_name: "Mesh".into(),
                field: "teapot".into()
            })
        );
        assert!(mesh.get("teapot").is_err());
    }

    #[test]
    fn test_failed_set_leaves_value_unchanged() {
        let graph = ObjectGraph::new();
        let mesh = graph.create("Mesh").unwrap();
        mesh.set("position", [1.0, 2.0, 3.0]).unwrap();
        assert!(mesh.set("position", [4.0, 5.0]).is_err());
        assert_eq!(mesh.get("position").unwrap(), Value::from([1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_unopened_writes_are_not_dirty() {
        let graph = ObjectGraph::new();
        let mesh = graph.create("Mesh").unwrap();
        mesh.set("visible", false).unwrap();
        assert!(!mesh.is_dirty());
    }

    #[test]
    fn test_handles_compare_by_identity() {
        let graph = ObjectGraph::new();
        let a = graph.create("Scene").unwrap();
        let b = graph.create("Scene").unwrap();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_references_are_deduplicated() {
        let graph = ObjectGraph::new();
        let material = graph.create("MeshLambertMaterial").unwrap();
        graph.register(&material).unwrap();
        let sprite = graph.create("Sprite").unwrap();
        sprite.set("material", &material).unwrap();
        let scene = graph.create("Scene").unwrap();
        graph.register(&sprite).unwrap();
        scene
            .set("children", vec![sprite.clone(), sprite.clone()])
            .unwrap();
        assert_eq!(scene.references(), vec![sprite.clone()]);
        assert_eq!(sprite.references(), vec![material]);
    }
}
