//! Field descriptors: the static schema entry for one synchronized attribute

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::array::{DType, ShapePattern, TypedArray};
use crate::schema::enums::EnumDomain;
use crate::value::Value;

/// Capability tags a type can provide, used to constrain object references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    Object3D,
    Geometry,
    SurfaceGeometry,
    Material,
    Texture,
    Camera,
    Light,
    Scene,
    Controls,
    Effect,
    Renderer,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The kind of value a field holds
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Integer; casts floats (truncating), bools and integer strings
    Int,
    /// Float; casts ints, bools and numeric strings
    Float,
    Str,
    Bool,
    /// CSS color string
    Color { nullable: bool },
    Enum(&'static EnumDomain),
    /// Fixed-length vector of `element`
    Vector { element: Box<FieldKind>, len: usize },
    /// Variable-length list of `element`
    List(Box<FieldKind>),
    /// Free-form string-keyed mapping
    Dict,
    /// Reference to another synchronized object providing `accepts`
    Object { accepts: Capability, nullable: bool },
    /// Typed array, optionally shape-constrained
    Array {
        dtype: DType,
        shape: Option<ShapePattern>,
    },
}

impl FieldKind {
    /// Whether values of this kind may contain object references
    pub fn holds_references(&self) -> bool {
        match self {
            FieldKind::Object { .. } => true,
            FieldKind::List(inner) | FieldKind::Vector { element: inner, .. } => {
                inner.holds_references()
            }
            _ => false,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, FieldKind::Array { .. })
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Int => f.write_str("int"),
            FieldKind::Float => f.write_str("float"),
            FieldKind::Str => f.write_str("str"),
            FieldKind::Bool => f.write_str("bool"),
            FieldKind::Color { .. } => f.write_str("color"),
            FieldKind::Enum(domain) => write!(f, "enum {}", domain.name),
            FieldKind::Vector { element, len } => write!(f, "vector{}<{}>", len, element),
            FieldKind::List(element) => write!(f, "list<{}>", element),
            FieldKind::Dict => f.write_str("dict"),
            FieldKind::Object { accepts, .. } => write!(f, "{} object", accepts),
            FieldKind::Array { dtype, shape } => match shape {
                Some(shape) => write!(f, "{} array {}", dtype, shape),
                None => write!(f, "{} array", dtype),
            },
        }
    }
}

/// Static schema entry for one synchronized attribute
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub kind: FieldKind,
    pub default: Value,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub help: Option<&'static str>,
}

impl FieldDescriptor {
    pub fn new(name: &'static str, kind: FieldKind, default: impl Into<Value>) -> Self {
        Self {
            name,
            kind,
            default: default.into(),
            min: None,
            max: None,
            help: None,
        }
    }

    pub fn int(name: &'static str, default: i64) -> Self {
        Self::new(name, FieldKind::Int, default)
    }

    pub fn float(name: &'static str, default: f64) -> Self {
        Self::new(name, FieldKind::Float, default)
    }

    pub fn string(name: &'static str, default: &str) -> Self {
        Self::new(name, FieldKind::Str, default)
    }

    pub fn boolean(name: &'static str, default: bool) -> Self {
        Self::new(name, FieldKind::Bool, default)
    }

    pub fn color(name: &'static str, default: &str) -> Self {
        Self::new(name, FieldKind::Color { nullable: false }, default)
    }

    pub fn nullable_color(name: &'static str, default: Option<&str>) -> Self {
        Self::new(name, FieldKind::Color { nullable: true }, default)
    }

    pub fn enumeration(name: &'static str, domain: &'static EnumDomain, default: &str) -> Self {
        Self::new(name, FieldKind::Enum(domain), default)
    }

    pub fn vector3(name: &'static str, default: [f64; 3]) -> Self {
        Self::new(
            name,
            FieldKind::Vector {
                element: Box::new(FieldKind::Float),
                len: 3,
            },
            default,
        )
    }

    pub fn int_vector3(name: &'static str, default: [i64; 3]) -> Self {
        Self::new(
            name,
            FieldKind::Vector {
                element: Box::new(FieldKind::Int),
                len: 3,
            },
            default,
        )
    }

    pub fn vector2(name: &'static str, default: [f64; 2]) -> Self {
        Self::new(
            name,
            FieldKind::Vector {
                element: Box::new(FieldKind::Float),
                len: 2,
            },
            default,
        )
    }

    pub fn list(name: &'static str, element: FieldKind, default: Vec<Value>) -> Self {
        Self::new(name, FieldKind::List(Box::new(element)), Value::List(default))
    }

    pub fn dict_list(name: &'static str) -> Self {
        Self::list(name, FieldKind::Dict, Vec::new())
    }

    /// Non-nullable reference; defaults to null until assigned.
    pub fn object(name: &'static str, accepts: Capability) -> Self {
        Self::new(
            name,
            FieldKind::Object {
                accepts,
                nullable: false,
            },
            Value::Null,
        )
    }

    pub fn nullable_object(name: &'static str, accepts: Capability) -> Self {
        Self::new(
            name,
            FieldKind::Object {
                accepts,
                nullable: true,
            },
            Value::Null,
        )
    }

    pub fn object_list(name: &'static str, accepts: Capability) -> Self {
        Self::list(
            name,
            FieldKind::Object {
                accepts,
                nullable: false,
            },
            Vec::new(),
        )
    }

    /// Typed array whose default is empty along every unconstrained dimension.
    pub fn array(name: &'static str, dtype: DType, shape: Option<ShapePattern>) -> Self {
        let default_shape = match &shape {
            Some(pattern) => pattern.0.iter().map(|d| d.unwrap_or(0)).collect(),
            None => vec![0],
        };
        // Only a fixed shape too large to allocate fails here.
        let default = TypedArray::zeros(dtype, default_shape).map_or(Value::Null, Value::Array);
        Self::new(name, FieldKind::Array { dtype, shape }, default)
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}
