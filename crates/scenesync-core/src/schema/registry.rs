//! Type schemas and the closed-world schema registry
//!
//! A [`TypeSchema`] is the ordered field set of one object type. Schemas are
//! composed with [`SchemaBuilder`]: a type extends its parent's schema and
//! adds or re-declares fields (re-declaring keeps the field's position and
//! replaces its descriptor, which is how subtypes override defaults).
//!
//! The [`SchemaRegistry`] is built once and never mutated afterwards.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;

use crate::coerce::coerce;
use crate::error::SyncResult;
use crate::schema::catalog;
use crate::schema::field::{Capability, FieldDescriptor, FieldKind};

/// Ordered field set of one object type
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSchema {
    name: &'static str,
    model_name: String,
    capabilities: Vec<Capability>,
    fields: IndexMap<&'static str, FieldDescriptor>,
}

impl TypeSchema {
    /// Type name used by the host (e.g. `Mesh`)
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name the peer constructs its mirror from (e.g. `MeshModel`)
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn provides(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.get_index_of(name)
    }

    pub fn field_at(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get_index(index).map(|(_, f)| f)
    }

    /// Fields in declaration order
    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.values()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check every default against its own field kind.
    ///
    /// Object fields may default to null even when not nullable: they are
    /// unset until assigned.
    pub fn validate_defaults(&self) -> SyncResult<()> {
        for field in self.fields.values() {
            if matches!(field.kind, FieldKind::Object { .. }) && field.default.is_null() {
                continue;
            }
            coerce(field, field.default.clone())?;
        }
        Ok(())
    }
}

/// Composes a [`TypeSchema`] from a parent and field fragments
pub struct SchemaBuilder {
    name: &'static str,
    model_name: Option<String>,
    capabilities: Vec<Capability>,
    fields: IndexMap<&'static str, FieldDescriptor>,
}

impl SchemaBuilder {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            model_name: None,
            capabilities: Vec::new(),
            fields: IndexMap::new(),
        }
    }

    /// Inherit every field and capability of `parent`.
    pub fn extend(mut self, parent: &TypeSchema) -> Self {
        for cap in &parent.capabilities {
            if !self.capabilities.contains(cap) {
                self.capabilities.push(*cap);
            }
        }
        for (name, field) in &parent.fields {
            self.fields.insert(*name, field.clone());
        }
        self
    }

    pub fn model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = Some(model_name.into());
        self
    }

    pub fn capability(mut self, capability: Capability) -> Self {
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
        self
    }

    /// Add a field, or replace an inherited one in place.
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.insert(field.name, field);
        self
    }

    pub fn fields(self, fields: impl IntoIterator<Item = FieldDescriptor>) -> Self {
        fields.into_iter().fold(self, SchemaBuilder::field)
    }

    pub fn build(self) -> TypeSchema {
        TypeSchema {
            name: self.name,
            model_name: self
                .model_name
                .unwrap_or_else(|| format!("{}Model", self.name)),
            capabilities: self.capabilities,
            fields: self.fields,
        }
    }
}

/// Closed-world mapping from type name to schema
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    types: HashMap<&'static str, Arc<TypeSchema>>,
}

impl SchemaRegistry {
    /// Shared registry holding the built-in scene catalog
    pub fn builtin() -> Arc<SchemaRegistry> {
        static BUILTIN: OnceLock<Arc<SchemaRegistry>> = OnceLock::new();
        BUILTIN
            .get_or_init(|| Arc::new(Self::with_builtin().build()))
            .clone()
    }

    /// Empty builder
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Builder pre-populated with the built-in catalog, for hosts adding types
    pub fn with_builtin() -> RegistryBuilder {
        catalog::builtin_types()
            .into_iter()
            .fold(RegistryBuilder::default(), RegistryBuilder::register)
    }

    pub fn get(&self, type_name: &str) -> Option<Arc<TypeSchema>> {
        self.types.get(type_name).cloned()
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    /// Registered type names, sorted
    pub fn type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.types.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Collects schemas before the registry is frozen
#[derive(Default)]
pub struct RegistryBuilder {
    types: HashMap<&'static str, Arc<TypeSchema>>,
}

impl RegistryBuilder {
    pub fn register(mut self, schema: TypeSchema) -> Self {
        self.types.insert(schema.name, Arc::new(schema));
        self
    }

    pub fn build(self) -> SchemaRegistry {
        SchemaRegistry { types: self.types }
    }
}
