//! Per-object sync session state machine
//!
//! ```text
//! Unopened ──open()──▶ Open ──close()──▶ Closing ──drained──▶ Closed
//!     │                 │                                       ▲
//!     │                 └──────── peer teardown ────────────────┤
//!     └──────────────────────── close() ────────────────────────┘
//! ```
//!
//! While open, local writes accumulate in a dirty set diffed against the
//! last-synchronized snapshot; `flush()` emits them as one update. Inbound
//! updates win over pending local changes (last writer by arrival order).

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::graph::ObjectGraph;
use crate::object::{ObjectState, SyncObject};
use crate::sync::codec::{self, ApplyReport};
use crate::sync::events::{SessionState, SyncEvent};
use crate::sync::protocol::{Envelope, WireMessage};
use crate::sync::transport::{SendError, Transport};
use crate::types::ObjectId;
use crate::value::Value;

/// Result of a flush
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was dirty; no message sent
    Clean,
    /// One update carrying these fields was handed to the transport
    Sent { fields: Vec<String> },
}

impl FlushOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, FlushOutcome::Clean)
    }
}

/// Session bookkeeping stored under the object's lock
pub(crate) struct Session {
    state: SessionState,
    transport: Option<Arc<dyn Transport>>,
    /// Last value the peer is known to hold, per field
    snapshot: Vec<Value>,
    dirty: BTreeSet<usize>,
}

impl Session {
    pub(crate) fn new(snapshot: Vec<Value>) -> Self {
        Self {
            state: SessionState::Unopened,
            transport: None,
            snapshot,
            dirty: BTreeSet::new(),
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn dirty(&self) -> impl Iterator<Item = usize> + '_ {
        self.dirty.iter().copied()
    }

    pub(crate) fn snapshot(&self) -> &[Value] {
        &self.snapshot
    }

    pub(crate) fn has_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Record a local write. Only open sessions track changes; a write back
    /// to exactly the synchronized value clears the field.
    pub(crate) fn track(&mut self, index: usize, value: &Value) {
        if self.state != SessionState::Open {
            return;
        }
        if value.same_as(&self.snapshot[index]) {
            self.dirty.remove(&index);
        } else {
            self.dirty.insert(index);
        }
    }

    /// Record a value the peer sent us: it is now synchronized, and it
    /// overrides any pending local change.
    pub(crate) fn accept_inbound(&mut self, index: usize, value: &Value) {
        self.snapshot[index] = value.clone();
        self.dirty.remove(&index);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("dirty", &self.dirty)
            .finish()
    }
}

fn send(
    graph: &ObjectGraph,
    object_id: ObjectId,
    transport: &dyn Transport,
    envelope: Envelope,
) -> SyncResult<()> {
    let err = match transport.try_send(envelope) {
        Ok(()) => return Ok(()),
        Err(SendError::Full) => SyncError::Backpressure(object_id),
        Err(SendError::Closed) => SyncError::Transport(format!("peer channel for {} closed", object_id)),
    };
    warn!(%object_id, error = %err, "Transport refused message");
    graph.emit(SyncEvent::TransportFailed {
        object_id,
        message: err.to_string(),
        retryable: err.is_retryable(),
    });
    Err(err)
}

impl SyncObject {
    fn set_state(&self, graph: &ObjectGraph, state: &mut ObjectState, next: SessionState) {
        if state.session.state == next {
            return;
        }
        debug!(object = %self.label(), from = %state.session.state, to = %next, "Session state changed");
        state.session.state = next;
        if let Some(object_id) = self.id() {
            graph.emit(SyncEvent::StateChanged {
                object_id,
                state: next,
            });
        }
    }

    fn dirty_names(&self, state: &ObjectState) -> Vec<String> {
        state
            .session
            .dirty()
            .filter_map(|i| self.inner.schema.field_at(i).map(|f| f.name.to_string()))
            .collect()
    }

    /// Open a session over `transport`.
    ///
    /// Registers the object if needed and sends the handshake carrying its
    /// full state. If the transport refuses the handshake the session stays
    /// `Unopened` and the call may be retried.
    pub fn open(&self, transport: Arc<dyn Transport>) -> SyncResult<ObjectId> {
        let graph = self.require_graph()?;
        let object_id = graph.register(self)?;

        let mut state = self.lock();
        match state.session.state {
            SessionState::Unopened => {}
            SessionState::Open => {
                return Err(SyncError::InvalidState(format!("{} is already open", object_id)))
            }
            SessionState::Closing | SessionState::Closed => {
                return Err(SyncError::SessionClosed(object_id.to_string()))
            }
        }

        let all: Vec<usize> = (0..state.values.len()).collect();
        let encoded = codec::encode_fields(&graph, &self.inner.schema, &state.values, &all)?;
        let envelope = Envelope::with_buffers(
            WireMessage::Handshake {
                object_identity: object_id,
                type_name: self.inner.schema.model_name().to_string(),
                full_initial_state: encoded.fields,
                binary_attachments: encoded.attachments,
            },
            encoded.buffers,
        );
        send(&graph, object_id, transport.as_ref(), envelope)?;

        let ObjectState { values, session } = &mut *state;
        session.snapshot.clone_from(values);
        session.dirty.clear();
        session.transport = Some(transport);
        self.set_state(&graph, &mut state, SessionState::Open);
        info!(%object_id, type_name = self.type_name(), "Session opened");
        Ok(object_id)
    }

    /// Send every dirty field as one update.
    ///
    /// On a transport failure the fields stay dirty and the error is
    /// retryable.
    pub fn flush(&self) -> SyncResult<FlushOutcome> {
        let graph = self.require_graph()?;
        let mut state = self.lock();
        match state.session.state {
            SessionState::Open | SessionState::Closing => self.flush_locked(&graph, &mut state),
            SessionState::Unopened => Err(SyncError::InvalidState(format!(
                "{} has no open session",
                self.label()
            ))),
            SessionState::Closed => Err(SyncError::SessionClosed(self.label())),
        }
    }

    pub(crate) fn flush_locked(
        &self,
        graph: &ObjectGraph,
        state: &mut ObjectState,
    ) -> SyncResult<FlushOutcome> {
        if !state.session.has_dirty() {
            return Ok(FlushOutcome::Clean);
        }
        let (Some(object_id), Some(transport)) = (self.id(), state.session.transport.clone())
        else {
            return Err(SyncError::InvalidState(format!(
                "{} has no transport",
                self.label()
            )));
        };

        let dirty: Vec<usize> = state.session.dirty().collect();
        let encoded = codec::encode_fields(graph, &self.inner.schema, &state.values, &dirty)?;
        let envelope = Envelope::with_buffers(
            WireMessage::Update {
                object_identity: object_id,
                changed_fields: encoded.fields,
                binary_attachments: encoded.attachments,
            },
            encoded.buffers,
        );
        send(graph, object_id, transport.as_ref(), envelope)?;

        let fields = self.dirty_names(state);
        for index in dirty {
            state.session.snapshot[index] = state.values[index].clone();
        }
        state.session.dirty.clear();

        debug!(%object_id, fields = ?fields, "Flushed");
        graph.emit(SyncEvent::Flushed {
            object_id,
            fields: fields.clone(),
        });
        Ok(FlushOutcome::Sent { fields })
    }

    /// Apply a message received from the peer.
    ///
    /// Updates are decoded and stored atomically; a teardown closes the
    /// session without echoing a teardown back.
    pub fn apply(&self, envelope: &Envelope) -> SyncResult<ApplyReport> {
        let object_id = self
            .id()
            .ok_or_else(|| SyncError::InvalidState(format!("{} is not registered", self.label())))?;
        if envelope.object_id() != object_id {
            return Err(SyncError::InvalidState(format!(
                "message for {} delivered to {}",
                envelope.object_id(),
                object_id
            )));
        }

        match &envelope.message {
            WireMessage::Update { .. } => codec::decode(envelope, self),
            WireMessage::Teardown { reason, .. } => {
                let graph = self.require_graph()?;
                let mut state = self.lock();
                if state.session.state == SessionState::Closed {
                    return Ok(ApplyReport::default());
                }
                if state.session.has_dirty() {
                    let fields = self.dirty_names(&state);
                    warn!(%object_id, fields = ?fields, "Peer closed with pending changes");
                    graph.emit(SyncEvent::FlushAbandoned { object_id, fields });
                    state.session.dirty.clear();
                }
                state.session.transport = None;
                self.set_state(&graph, &mut state, SessionState::Closed);
                info!(%object_id, %reason, "Session closed by peer");
                graph.emit(SyncEvent::TornDown {
                    object_id,
                    reason: reason.clone(),
                });
                Ok(ApplyReport::default())
            }
            WireMessage::Handshake { .. } => Err(SyncError::InvalidState(format!(
                "unexpected handshake for {}",
                object_id
            ))),
        }
    }

    /// Close the session.
    ///
    /// Pending changes are flushed first. If the transport is not ready the
    /// session stays `Closing` and the call returns a retryable error; any
    /// other flush failure drops the pending changes, closes anyway and
    /// reports [`SyncError::FlushAbandoned`]. Closing a closed session is a
    /// no-op, and closing an unopened one sends nothing.
    pub fn close(&self, reason: &str) -> SyncResult<()> {
        let mut state = self.lock();
        match state.session.state {
            SessionState::Closed => return Ok(()),
            SessionState::Unopened => {
                state.session.state = SessionState::Closed;
                if let (Some(graph), Some(object_id)) = (self.graph(), self.id()) {
                    graph.emit(SyncEvent::StateChanged {
                        object_id,
                        state: SessionState::Closed,
                    });
                }
                debug!(object = %self.label(), "Closed before opening");
                return Ok(());
            }
            SessionState::Open | SessionState::Closing => {}
        }

        let graph = self.require_graph()?;
        let (Some(object_id), Some(transport)) = (self.id(), state.session.transport.clone())
        else {
            return Err(SyncError::InvalidState(format!(
                "{} is open without a transport",
                self.label()
            )));
        };
        self.set_state(&graph, &mut state, SessionState::Closing);

        let mut abandoned = None;
        match self.flush_locked(&graph, &mut state) {
            Ok(_) => {}
            Err(err @ SyncError::Backpressure(_)) => return Err(err),
            Err(err) => {
                let fields = self.dirty_names(&state);
                warn!(%object_id, fields = ?fields, error = %err, "Abandoning pending changes");
                graph.emit(SyncEvent::FlushAbandoned {
                    object_id,
                    fields: fields.clone(),
                });
                state.session.dirty.clear();
                abandoned = Some(fields);
            }
        }

        let teardown = Envelope::new(WireMessage::Teardown {
            object_identity: object_id,
            reason: reason.to_string(),
        });
        match send(&graph, object_id, transport.as_ref(), teardown) {
            Ok(()) => {}
            Err(err @ SyncError::Backpressure(_)) => return Err(err),
            // Peer already gone; nothing left to notify.
            Err(_) => {}
        }

        state.session.transport = None;
        self.set_state(&graph, &mut state, SessionState::Closed);
        info!(%object_id, %reason, "Session closed");
        graph.emit(SyncEvent::TornDown {
            object_id,
            reason: reason.to_string(),
        });

        match abandoned {
            Some(fields) => Err(SyncError::FlushAbandoned { object_id, fields }),
            None => Ok(()),
        }
    }
}
