//! Field registry
//!
//! Per-type schemas describing every synchronized field: kind, default and
//! constraints. Schemas are closed-world: built once, then shared read-only.
//!
//! ```text
//! SchemaRegistry
//! ├── "Mesh"     -> TypeSchema { Object3D fields.., geometry, material }
//! ├── "Renderer" -> TypeSchema { width, height, scene, camera, controls, .. }
//! └── ...
//! ```

pub mod catalog;
pub mod color;
pub mod enums;
pub mod field;
pub mod registry;

pub use enums::EnumDomain;
pub use field::{Capability, FieldDescriptor, FieldKind};
pub use registry::{RegistryBuilder, SchemaBuilder, SchemaRegistry, TypeSchema};
