//! Value coercion and validation
//!
//! [`coerce`] converts a raw value into the normalized form a field stores,
//! or fails without side effects. It is context-free: checks that need the
//! object graph (registration, cycles) live in [`crate::graph`].
//!
//! Numeric casting follows the widget traits the schema mirrors:
//! - `Int` accepts ints, bools, integer strings, and finite floats
//!   (truncated toward zero)
//! - `Float` accepts ints, floats, bools and numeric strings
//! - `Str`, `Bool` and `Dict` are strict

use crate::array::{ArrayError, DType, ShapePattern, TypedArray};
use crate::error::{SyncError, SyncResult};
use crate::schema::color::is_valid_color;
use crate::schema::field::{FieldDescriptor, FieldKind};
use crate::value::Value;

/// Validate and normalize `raw` for `field`.
pub fn coerce(field: &FieldDescriptor, raw: Value) -> SyncResult<Value> {
    let value = coerce_kind(field.name, &field.kind, raw)?;
    check_range(field, &value)?;
    Ok(value)
}

/// Validate and normalize `raw` against a bare kind; `name` is only used in errors.
pub fn coerce_kind(name: &str, kind: &FieldKind, raw: Value) -> SyncResult<Value> {
    match kind {
        FieldKind::Int => coerce_int(name, raw).map(Value::Int),
        FieldKind::Float => coerce_float(name, raw).map(Value::Float),
        FieldKind::Str => match raw {
            Value::Str(_) => Ok(raw),
            other => Err(mismatch(name, kind, &other)),
        },
        FieldKind::Bool => match raw {
            Value::Bool(_) => Ok(raw),
            other => Err(mismatch(name, kind, &other)),
        },
        FieldKind::Dict => match raw {
            Value::Dict(_) => Ok(raw),
            other => Err(mismatch(name, kind, &other)),
        },
        FieldKind::Color { nullable } => match raw {
            Value::Null if *nullable => Ok(Value::Null),
            Value::Str(s) if is_valid_color(&s) => Ok(Value::Str(s)),
            Value::Str(s) => Err(SyncError::DomainError {
                field: name.to_string(),
                domain: "color".to_string(),
                value: s,
            }),
            other => Err(mismatch(name, kind, &other)),
        },
        FieldKind::Enum(domain) => match raw {
            Value::Str(s) if domain.contains(&s) => Ok(Value::Str(s)),
            Value::Str(s) => Err(SyncError::DomainError {
                field: name.to_string(),
                domain: domain.name.to_string(),
                value: s,
            }),
            other => Err(mismatch(name, kind, &other)),
        },
        FieldKind::Vector { element, len } => {
            let items = match raw {
                Value::List(items) => items,
                Value::Array(arr) if arr.shape().len() == 1 => {
                    arr.to_f64_vec().into_iter().map(Value::Float).collect()
                }
                other => return Err(mismatch(name, kind, &other)),
            };
            if items.len() != *len {
                return Err(SyncError::LengthMismatch {
                    field: name.to_string(),
                    expected: *len,
                    actual: items.len(),
                });
            }
            coerce_items(name, element, items)
        }
        FieldKind::List(element) => match raw {
            Value::List(items) => coerce_items(name, element, items),
            other => Err(mismatch(name, kind, &other)),
        },
        FieldKind::Object { accepts, nullable } => match raw {
            Value::Null if *nullable => Ok(Value::Null),
            Value::Object(obj) if obj.schema().provides(*accepts) => Ok(Value::Object(obj)),
            Value::Object(obj) => Err(SyncError::type_mismatch(
                name,
                kind.to_string(),
                obj.type_name(),
            )),
            other => Err(mismatch(name, kind, &other)),
        },
        FieldKind::Array { dtype, shape } => coerce_array(name, kind, *dtype, shape.as_ref(), raw),
    }
}

fn coerce_items(name: &str, element: &FieldKind, items: Vec<Value>) -> SyncResult<Value> {
    items
        .into_iter()
        .map(|item| coerce_kind(name, element, item))
        .collect::<SyncResult<Vec<_>>>()
        .map(Value::List)
}

fn coerce_int(name: &str, raw: Value) -> SyncResult<i64> {
    match raw {
        Value::Int(i) => Ok(i),
        Value::Bool(b) => Ok(b as i64),
        Value::Float(f) if f.is_finite() && f.abs() < i64::MAX as f64 => Ok(f.trunc() as i64),
        Value::Str(ref s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| SyncError::type_mismatch(name, "int", format!("str '{}'", s))),
        other => Err(mismatch(name, &FieldKind::Int, &other)),
    }
}

fn coerce_float(name: &str, raw: Value) -> SyncResult<f64> {
    match raw {
        Value::Float(f) => Ok(f),
        Value::Int(i) => Ok(i as f64),
        Value::Bool(b) => Ok(if b { 1.0 } else { 0.0 }),
        Value::Str(ref s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| SyncError::type_mismatch(name, "float", format!("str '{}'", s))),
        other => Err(mismatch(name, &FieldKind::Float, &other)),
    }
}

fn coerce_array(
    name: &str,
    kind: &FieldKind,
    dtype: DType,
    pattern: Option<&ShapePattern>,
    raw: Value,
) -> SyncResult<Value> {
    let arr = match raw {
        Value::Array(arr) => arr,
        Value::List(_) => array_from_nested(name, &raw)?,
        other => return Err(mismatch(name, kind, &other)),
    };
    if let Some(pattern) = pattern {
        if !pattern.matches(arr.shape()) {
            return Err(SyncError::ShapeMismatch {
                field: name.to_string(),
                expected: pattern.to_string(),
                actual: arr.shape().to_vec(),
            });
        }
    }
    let arr = arr.cast(dtype).map_err(|e| array_error(name, e))?;
    Ok(Value::Array(arr))
}

/// Build a float64 array from nested numeric lists, inferring the shape from
/// the first element at each depth. Ragged nesting is a shape mismatch.
fn array_from_nested(name: &str, raw: &Value) -> SyncResult<TypedArray> {
    let mut shape = Vec::new();
    let mut cursor = raw;
    while let Value::List(items) = cursor {
        shape.push(items.len());
        match items.first() {
            Some(first) => cursor = first,
            None => break,
        }
    }

    // Shape comes from the first element only; grow as the walk confirms it.
    let mut values = Vec::new();
    flatten(name, raw, &shape, 0, &mut values)?;
    TypedArray::from_vec(shape, values).map_err(|e| array_error(name, e))
}

fn flatten(
    name: &str,
    value: &Value,
    shape: &[usize],
    depth: usize,
    out: &mut Vec<f64>,
) -> SyncResult<()> {
    let ragged = || SyncError::ShapeMismatch {
        field: name.to_string(),
        expected: "rectangular nested list".to_string(),
        actual: shape.to_vec(),
    };
    match value {
        Value::List(items) => {
            if depth >= shape.len() || items.len() != shape[depth] {
                return Err(ragged());
            }
            items
                .iter()
                .try_for_each(|item| flatten(name, item, shape, depth + 1, out))
        }
        leaf => {
            if depth != shape.len() {
                return Err(ragged());
            }
            let number = match leaf {
                Value::Bool(b) => *b as i64 as f64,
                other => other
                    .as_f64()
                    .ok_or_else(|| SyncError::type_mismatch(name, "number", other.kind_name()))?,
            };
            out.push(number);
            Ok(())
        }
    }
}

fn check_range(field: &FieldDescriptor, value: &Value) -> SyncResult<()> {
    if field.min.is_none() && field.max.is_none() {
        return Ok(());
    }
    let Some(v) = value.as_f64() else {
        return Ok(());
    };
    let min = field.min.unwrap_or(f64::NEG_INFINITY);
    let max = field.max.unwrap_or(f64::INFINITY);
    if v >= min && v <= max {
        Ok(())
    } else {
        Err(SyncError::OutOfRange {
            field: field.name.to_string(),
            value: v,
            min,
            max,
        })
    }
}

fn mismatch(name: &str, kind: &FieldKind, found: &Value) -> SyncError {
    SyncError::type_mismatch(name, kind.to_string(), found.kind_name())
}

pub(crate) fn array_error(name: &str, err: ArrayError) -> SyncError {
    match &err {
        ArrayError::BufferSize { expected, actual } => SyncError::BufferSizeMismatch {
            field: name.to_string(),
            expected: *expected,
            actual: *actual,
        },
        ArrayError::ElementCount {
            shape, expected, ..
        } => SyncError::ShapeMismatch {
            field: name.to_string(),
            expected: format!("{} elements", expected),
            actual: shape.clone(),
        },
        ArrayError::Cast { to, .. } => {
            SyncError::type_mismatch(name, format!("{} array", to), err.to_string())
        }
        ArrayError::TooLarge { shape } => SyncError::ShapeMismatch {
            field: name.to_string(),
            expected: "an allocatable shape".to_string(),
            actual: shape.clone(),
        },
    }
}
