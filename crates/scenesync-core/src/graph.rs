//! Object reference graph
//!
//! The graph creates objects from the schema registry, assigns identities on
//! registration and resolves identities back to objects. Edges are the
//! object references stored in fields; the graph keeps them acyclic and
//! exposes reachability so unreferenced objects can be torn down.
//!
//! ```text
//! Renderer ──scene──▶ Scene ──children──▶ Mesh ──geometry──▶ BoxGeometry
//!     │                                     └────material──▶ MeshLambertMaterial
//!     └──camera──▶ PerspectiveCamera                            ▲
//!                                           Mesh ──material─────┘  (shared)
//! ```

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::object::{ObjectInner, SyncObject};
use crate::schema::SchemaRegistry;
use crate::sync::events::{SessionState, SyncEvent};
use crate::sync::session::FlushOutcome;
use crate::sync::transport::Transport;
use crate::types::ObjectId;
use crate::value::Value;

/// Shared state behind every [`ObjectGraph`] handle
pub(crate) struct GraphInner {
    registry: Arc<SchemaRegistry>,
    objects: RwLock<HashMap<ObjectId, SyncObject>>,
    /// Serializes reference edits from the cycle check through the store
    reference_edits: Mutex<()>,
    events: broadcast::Sender<SyncEvent>,
    config: SyncConfig,
}

/// Registry of live synchronized objects and the references between them.
///
/// Cloning is cheap; clones share the same registry.
///
/// # Example
///
/// ```ignore
/// let graph = ObjectGraph::new();
///
/// let geometry = graph.create("BoxGeometry")?;
/// graph.register(&geometry)?;
///
/// let mesh = graph.create("Mesh")?;
/// mesh.set("geometry", &geometry)?;
///
/// // Subscribe to sync activity
/// let mut rx = graph.subscribe();
/// ```
#[derive(Clone)]
pub struct ObjectGraph {
    inner: Arc<GraphInner>,
}

impl ObjectGraph {
    /// Graph over the built-in scene types with default configuration.
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    pub fn with_config(config: SyncConfig) -> Self {
        Self::with_registry(SchemaRegistry::builtin(), config)
    }

    /// Graph over a custom registry.
    pub fn with_registry(registry: Arc<SchemaRegistry>, config: SyncConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(GraphInner {
                registry,
                objects: RwLock::new(HashMap::new()),
                reference_edits: Mutex::new(()),
                events,
                config,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<GraphInner>) -> Self {
        Self { inner }
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.inner.registry
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Instantiate a type with its default field values. The object is not
    /// registered yet.
    pub fn create(&self, type_name: &str) -> SyncResult<SyncObject> {
        let schema = self
            .inner
            .registry
            .get(type_name)
            .ok_or_else(|| SyncError::UnknownType(type_name.to_string()))?;
        Ok(SyncObject::new(schema, Arc::downgrade(&self.inner)))
    }

    /// Instantiate a type and assign initial field values.
    pub fn create_with<'a, I, V>(&self, type_name: &str, fields: I) -> SyncResult<SyncObject>
    where
        I: IntoIterator<Item = (&'a str, V)>,
        V: Into<Value>,
    {
        let obj = self.create(type_name)?;
        obj.set_many(fields)?;
        Ok(obj)
    }

    /// Register an object, assigning its identity on first registration.
    /// Registering again returns the same identity.
    pub fn register(&self, obj: &SyncObject) -> SyncResult<ObjectId> {
        if !obj.inner.graph.ptr_eq(&Arc::downgrade(&self.inner)) {
            return Err(SyncError::InvalidState(format!(
                "{} belongs to a different graph",
                obj.label()
            )));
        }

        let id = *obj.inner.id.get_or_init(ObjectId::new);
        let inserted = match self.inner.objects.write().entry(id) {
            Entry::Vacant(entry) => {
                entry.insert(obj.clone());
                true
            }
            Entry::Occupied(_) => false,
        };

        if inserted {
            debug!(object_id = %id, type_name = obj.type_name(), "Registered object");
            self.emit(SyncEvent::Registered {
                object_id: id,
                type_name: obj.type_name().to_string(),
            });
        }
        Ok(id)
    }

    pub(crate) fn unregister(&self, id: ObjectId) -> Option<SyncObject> {
        self.inner.objects.write().remove(&id)
    }

    pub fn resolve(&self, id: ObjectId) -> SyncResult<SyncObject> {
        self.inner
            .objects
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(id.to_string()))
    }

    /// Resolve an `IPY_MODEL_` reference token.
    pub fn resolve_token(&self, token: &str) -> SyncResult<SyncObject> {
        let id = ObjectId::from_token(token).ok_or_else(|| SyncError::NotFound(token.to_string()))?;
        self.resolve(id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.inner.objects.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.objects.read().is_empty()
    }

    /// Registered objects, sorted by identity
    pub fn objects(&self) -> Vec<SyncObject> {
        let mut entries: Vec<(ObjectId, SyncObject)> = self
            .inner
            .objects
            .read()
            .iter()
            .map(|(id, obj)| (*id, obj.clone()))
            .collect();
        entries.sort_by_key(|(id, _)| *id);
        entries.into_iter().map(|(_, obj)| obj).collect()
    }

    /// Objects directly held by `obj`
    pub fn edges_from(&self, obj: &SyncObject) -> Vec<SyncObject> {
        obj.references()
    }

    /// Whether `holder` holding `candidate` would close a cycle, i.e.
    /// `holder` is `candidate` or is reachable from it.
    pub fn would_create_cycle(&self, holder: &SyncObject, candidate: &SyncObject) -> bool {
        let mut stack = vec![candidate.clone()];
        let mut visited: HashSet<*const ObjectInner> = HashSet::new();
        while let Some(node) = stack.pop() {
            // Checked before locking, so the holder's own lock is never taken.
            if node.ptr_eq(holder) {
                return true;
            }
            if visited.insert(node.key()) {
                stack.extend(node.references());
            }
        }
        false
    }

    /// `root` and everything reachable from it, leaves first.
    pub fn reachable_from(&self, root: &SyncObject) -> Vec<SyncObject> {
        fn visit(
            node: &SyncObject,
            seen: &mut HashSet<*const ObjectInner>,
            order: &mut Vec<SyncObject>,
        ) {
            if !seen.insert(node.key()) {
                return;
            }
            for child in node.references() {
                visit(&child, seen, order);
            }
            order.push(node.clone());
        }

        let mut seen = HashSet::new();
        let mut order = Vec::new();
        visit(root, &mut seen, &mut order);
        order
    }

    /// Hold while validating and storing a reference-holding value, so two
    /// concurrent edits cannot each pass the cycle check and then close a
    /// cycle together. Taken before any object lock.
    pub(crate) fn lock_reference_edits(&self) -> MutexGuard<'_, ()> {
        self.inner.reference_edits.lock()
    }

    /// Check the references in a value about to be stored on `holder`:
    /// every held object must be registered, and none may lead back to
    /// `holder`.
    pub(crate) fn validate_references(
        &self,
        holder: &SyncObject,
        field: &str,
        value: &Value,
    ) -> SyncResult<()> {
        let mut held = Vec::new();
        value.referenced_objects(&mut held);
        for obj in &held {
            let id = match obj.id() {
                Some(id) if self.contains(id) => id,
                _ => {
                    return Err(SyncError::UnregisteredReference {
                        field: field.to_string(),
                        type_name: obj.type_name().to_string(),
                    })
                }
            };
            if self.would_create_cycle(holder, obj) {
                return Err(SyncError::CyclicReference {
                    holder: holder.label(),
                    field: field.to_string(),
                    held: id,
                });
            }
        }
        Ok(())
    }

    /// Subscribe to sync events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    pub(crate) fn emit(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    /// Open every unopened object reachable from `root`, leaves first, so
    /// the peer sees each held object's handshake before any holder.
    pub fn open_tree(
        &self,
        root: &SyncObject,
        transport: Arc<dyn Transport>,
    ) -> SyncResult<Vec<ObjectId>> {
        let mut opened = Vec::new();
        for obj in self.reachable_from(root) {
            if obj.session_state() == SessionState::Unopened {
                opened.push(obj.open(transport.clone())?);
            }
        }
        info!(root = %root.label(), opened = opened.len(), "Opened object tree");
        Ok(opened)
    }

    /// Flush every open object.
    pub fn flush_all(&self) -> Vec<(ObjectId, SyncResult<FlushOutcome>)> {
        self.objects()
            .into_iter()
            .filter(|obj| {
                matches!(
                    obj.session_state(),
                    SessionState::Open | SessionState::Closing
                )
            })
            .filter_map(|obj| obj.id().map(|id| (id, obj.flush())))
            .collect()
    }

    /// Tear down and unregister every object that is neither held by the
    /// application nor reachable from an object that is.
    ///
    /// A handle is "held by the application" when its strong count exceeds
    /// what the graph itself accounts for: the registry entry plus every
    /// reference stored in another registered object.
    pub fn collect_garbage(&self) -> Vec<ObjectId> {
        let registered: Vec<(ObjectId, SyncObject)> = self
            .inner
            .objects
            .read()
            .iter()
            .map(|(id, obj)| (*id, obj.clone()))
            .collect();

        let mut inbound: HashMap<ObjectId, usize> = HashMap::new();
        for (_, obj) in &registered {
            let mut held = Vec::new();
            {
                let state = obj.lock();
                for value in state.values.iter().chain(state.session.snapshot()) {
                    value.referenced_objects(&mut held);
                }
            }
            for target in held {
                if let Some(id) = target.id() {
                    *inbound.entry(id).or_default() += 1;
                }
            }
        }

        // Registry entry + the clone in `registered`.
        const GRAPH_HANDLES: usize = 2;
        let roots: Vec<SyncObject> = registered
            .iter()
            .filter(|(id, obj)| {
                let accounted = GRAPH_HANDLES + inbound.get(id).copied().unwrap_or(0);
                obj.handle_count() > accounted
            })
            .map(|(_, obj)| obj.clone())
            .collect();

        let mut live: HashSet<*const ObjectInner> = HashSet::new();
        for root in &roots {
            live.extend(self.reachable_from(root).iter().map(SyncObject::key));
        }
        drop(roots);

        let mut collected = Vec::new();
        for (id, obj) in &registered {
            if live.contains(&obj.key()) {
                continue;
            }
            match obj.close("unreachable") {
                Ok(()) | Err(SyncError::FlushAbandoned { .. }) => {
                    self.unregister(*id);
                    collected.push(*id);
                }
                Err(err) => {
                    warn!(object_id = %id, error = %err, "Could not tear down unreachable object");
                }
            }
        }

        if !collected.is_empty() {
            info!(count = collected.len(), "Collected unreachable objects");
        }
        collected
    }
}

impl Default for ObjectGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectGraph")
            .field("objects", &self.len())
            .field("config", &self.inner.config)
            .finish()
    }
}
