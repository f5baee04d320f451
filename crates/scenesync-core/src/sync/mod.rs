//! Object-state synchronization with the front-end peer
//!
//! ## Overview
//!
//! Each [`SyncObject`](crate::SyncObject) owns a session that mirrors its
//! fields to a peer over a [`Transport`]. Local writes accumulate in a dirty
//! set; a flush encodes them into one [`WireMessage::Update`]. The peer's
//! updates come back through [`SyncObject::apply`](crate::SyncObject::apply).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  session   (state machine: open / flush / apply / close)        │
//! │  ├── codec      (Value <-> JSON header + binary buffers)        │
//! │  ├── protocol   (Handshake / Update / Teardown messages)        │
//! │  └── transport  (non-blocking hand-off to the peer channel)     │
//! │                                                                 │
//! │  events    (SessionState, SyncEvent observer notifications)     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let mesh = graph.create("Mesh")?;
//! mesh.open(Arc::new(tx))?;            // handshake
//!
//! mesh.set("position", [0.0, 1.0, 0.0])?;
//! mesh.set("visible", false)?;
//! mesh.flush()?;                       // one update with both fields
//!
//! while let Ok(envelope) = rx.try_recv() {
//!     send_to_peer(envelope.message.to_json()?, envelope.buffers);
//! }
//! ```

pub mod codec;
pub mod events;
pub mod protocol;
pub mod session;
pub mod transport;

pub use codec::{decode, encode, ApplyReport};
pub use events::{SessionState, SyncEvent};
pub use protocol::{Attachment, Envelope, WireMessage};
pub use session::FlushOutcome;
pub use transport::{SendError, Transport};
