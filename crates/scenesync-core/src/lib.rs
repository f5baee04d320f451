//! Scenesync Core Library
//!
//! Typed, bidirectional object-state sync for 3D scene widgets.
//!
//! ## Overview
//!
//! Scenesync keeps host-side scene objects (meshes, geometries, materials,
//! cameras, renderers) consistent with their mirrors in a remote front-end
//! peer. Every object type has a closed-world schema; every write is
//! validated and normalized before it is stored; changes are batched per
//! object and sent as one message per flush, with typed arrays carried as
//! raw binary buffers beside the JSON header.
//!
//! ## Core Principles
//!
//! - **All-or-nothing writes**: a rejected assignment leaves the object unchanged
//! - **References by identity**: nested objects travel as identity tokens
//! - **Explicit sessions**: open, flush, apply and close are plain calls
//!   returning `Result`, not property side effects
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use scenesync_core::{ObjectGraph, TypedArray};
//!
//! let graph = ObjectGraph::new();
//!
//! let geometry = graph.create("PlainBufferGeometry")?;
//! geometry.set("vertices", TypedArray::from_vec(vec![3, 3], vertices)?)?;
//! graph.register(&geometry)?;
//!
//! let mesh = graph.create("Mesh")?;
//! mesh.set("geometry", &geometry)?;
//!
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! graph.open_tree(&mesh, Arc::new(tx))?;   // handshakes, leaves first
//!
//! mesh.set("position", [0.0, 1.0, 0.0])?;
//! graph.flush_all();                        // one update per dirty object
//! ```

pub mod array;
pub mod coerce;
pub mod config;
pub mod error;
pub mod graph;
pub mod object;
pub mod scene;
pub mod schema;
pub mod sync;
pub mod types;
pub mod value;

// Re-exports
pub use array::{DType, ShapePattern, TypedArray};
pub use coerce::coerce;
pub use config::{FlushPolicy, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use graph::ObjectGraph;
pub use object::SyncObject;
pub use schema::{
    Capability, FieldDescriptor, FieldKind, SchemaBuilder, SchemaRegistry, TypeSchema,
};
pub use sync::{
    ApplyReport, Attachment, Envelope, FlushOutcome, SendError, SessionState, SyncEvent,
    Transport, WireMessage,
};
pub use types::{ObjectId, REFERENCE_PREFIX};
pub use value::Value;
