//! Session states and the events reported to observers
//!
//! Every object's session moves through a fixed lifecycle. Observers
//! subscribed through [`crate::ObjectGraph::subscribe`] receive a
//! [`SyncEvent`] for each transition, flush, and transport problem.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  SessionState: Per-object lifecycle                             │
//! │  ├── Unopened: Not yet announced to the peer                    │
//! │  ├── Open: Handshake sent, local writes accumulate as dirty     │
//! │  ├── Closing: Draining pending changes before teardown          │
//! │  └── Closed: Torn down, further writes fail                     │
//! │                                                                 │
//! │  SyncEvent: Notifications about sync activity                   │
//! │  ├── Registered: Object received an identity                    │
//! │  ├── StateChanged: Session moved to a new state                 │
//! │  ├── Flushed: Dirty fields were handed to the transport         │
//! │  ├── UnknownField: Inbound message named an undeclared field    │
//! │  ├── TransportFailed: Transport refused a message               │
//! │  ├── FlushAbandoned: Pending changes dropped at close           │
//! │  └── TornDown: Session reached Closed                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use crate::types::ObjectId;

/// Lifecycle state of one object's sync session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Unopened,
    Open,
    Closing,
    Closed,
}

impl SessionState {
    /// Whether local writes are still accepted
    pub fn accepts_writes(self) -> bool {
        matches!(self, SessionState::Unopened | SessionState::Open)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Unopened => write!(f, "Unopened"),
            SessionState::Open => write!(f, "Open"),
            SessionState::Closing => write!(f, "Closing"),
            SessionState::Closed => write!(f, "Closed"),
        }
    }
}

/// Events emitted during synchronization
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// An object was registered with the graph
    Registered {
        object_id: ObjectId,
        type_name: String,
    },
    /// An object's session changed state
    StateChanged {
        object_id: ObjectId,
        state: SessionState,
    },
    /// Dirty fields were encoded and handed to the transport
    Flushed {
        object_id: ObjectId,
        fields: Vec<String>,
    },
    /// An inbound message named a field the type does not declare
    UnknownField { object_id: ObjectId, field: String },
    /// The transport refused a message; affected fields stay dirty
    TransportFailed {
        object_id: ObjectId,
        /// Error message
        message: String,
        /// Whether a later flush may succeed
        retryable: bool,
    },
    /// Pending changes could not be delivered before close
    FlushAbandoned {
        object_id: ObjectId,
        fields: Vec<String>,
    },
    /// The session reached `Closed`
    TornDown { object_id: ObjectId, reason: String },
}

impl SyncEvent {
    /// Get the object this event is about
    pub fn object_id(&self) -> ObjectId {
        match self {
            SyncEvent::Registered { object_id, .. }
            | SyncEvent::StateChanged { object_id, .. }
            | SyncEvent::Flushed { object_id, .. }
            | SyncEvent::UnknownField { object_id, .. }
            | SyncEvent::TransportFailed { object_id, .. }
            | SyncEvent::FlushAbandoned { object_id, .. }
            | SyncEvent::TornDown { object_id, .. } => *object_id,
        }
    }
}
