//! Typed arrays with shape metadata
//!
//! A [`TypedArray`] is a flat, row-major element buffer plus a shape. It is
//! the in-memory form of array-valued fields (vertex positions, face
//! indices, texture data) and travels over the wire as a raw binary
//! attachment next to the JSON header.
//!
//! Element bytes use the host's native layout viewed through `bytemuck`.
//! The peer is a JavaScript typed array, so the effective wire byte order
//! is little-endian.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Element type of a typed array, named after the numpy dtypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
}

impl DType {
    /// Size of one element in bytes
    pub fn size(self) -> usize {
        match self {
            DType::Int8 | DType::Uint8 => 1,
            DType::Int16 | DType::Uint16 => 2,
            DType::Int32 | DType::Uint32 | DType::Float32 => 4,
            DType::Float64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DType::Int8 => "int8",
            DType::Uint8 => "uint8",
            DType::Int16 => "int16",
            DType::Uint16 => "uint16",
            DType::Int32 => "int32",
            DType::Uint32 => "uint32",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, DType::Float32 | DType::Float64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors raised by array construction and conversion.
///
/// These carry no field name; coercion attaches one when mapping them into
/// [`crate::SyncError`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArrayError {
    #[error("shape {shape:?} needs {expected} elements, got {actual}")]
    ElementCount {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    #[error("buffer holds {actual} bytes, dtype x shape needs {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("value {value} is not representable as {to}")]
    Cast { value: f64, to: DType },

    #[error("shape {shape:?} is too large to allocate")]
    TooLarge { shape: Vec<usize> },
}

/// Rust element types that can back a typed array.
pub trait Element: bytemuck::Pod + PartialEq + fmt::Debug + Send + Sync + 'static {
    const DTYPE: DType;

    fn to_f64(self) -> f64;

    /// Exact conversion; `None` if the value does not fit this element type.
    fn from_f64(value: f64) -> Option<Self>;

    fn into_data(values: Vec<Self>) -> ArrayData;

    fn slice(data: &ArrayData) -> Option<&[Self]>;
}

macro_rules! int_element {
    ($t:ty, $variant:ident) => {
        impl Element for $t {
            const DTYPE: DType = DType::$variant;

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(value: f64) -> Option<Self> {
                let in_range = value >= <$t>::MIN as f64 && value <= <$t>::MAX as f64;
                if value.fract() == 0.0 && in_range {
                    Some(value as $t)
                } else {
                    None
                }
            }

            fn into_data(values: Vec<Self>) -> ArrayData {
                ArrayData::$variant(values)
            }

            fn slice(data: &ArrayData) -> Option<&[Self]> {
                match data {
                    ArrayData::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

int_element!(i8, Int8);
int_element!(u8, Uint8);
int_element!(i16, Int16);
int_element!(u16, Uint16);
int_element!(i32, Int32);
int_element!(u32, Uint32);

impl Element for f32 {
    const DTYPE: DType = DType::Float32;

    fn to_f64(self) -> f64 {
        self as f64
    }

    // Narrowing is allowed; only finite values beyond f32's range are rejected.
    fn from_f64(value: f64) -> Option<Self> {
        if value.is_finite() && value.abs() > f32::MAX as f64 {
            None
        } else {
            Some(value as f32)
        }
    }

    fn into_data(values: Vec<Self>) -> ArrayData {
        ArrayData::Float32(values)
    }

    fn slice(data: &ArrayData) -> Option<&[Self]> {
        match data {
            ArrayData::Float32(v) => Some(v),
            _ => None,
        }
    }
}

impl Element for f64 {
    const DTYPE: DType = DType::Float64;

    fn to_f64(self) -> f64 {
        self
    }

    fn from_f64(value: f64) -> Option<Self> {
        Some(value)
    }

    fn into_data(values: Vec<Self>) -> ArrayData {
        ArrayData::Float64(values)
    }

    fn slice(data: &ArrayData) -> Option<&[Self]> {
        match data {
            ArrayData::Float64(v) => Some(v),
            _ => None,
        }
    }
}

/// Flat element storage, one variant per dtype
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Int8(Vec<i8>),
    Uint8(Vec<u8>),
    Int16(Vec<i16>),
    Uint16(Vec<u16>),
    Int32(Vec<i32>),
    Uint32(Vec<u32>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

macro_rules! with_data {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            ArrayData::Int8($v) => $body,
            ArrayData::Uint8($v) => $body,
            ArrayData::Int16($v) => $body,
            ArrayData::Uint16($v) => $body,
            ArrayData::Int32($v) => $body,
            ArrayData::Uint32($v) => $body,
            ArrayData::Float32($v) => $body,
            ArrayData::Float64($v) => $body,
        }
    };
}

macro_rules! with_dtype {
    ($dtype:expr, $t:ident => $body:expr) => {
        match $dtype {
            DType::Int8 => {
                type $t = i8;
                $body
            }
            DType::Uint8 => {
                type $t = u8;
                $body
            }
            DType::Int16 => {
                type $t = i16;
                $body
            }
            DType::Uint16 => {
                type $t = u16;
                $body
            }
            DType::Int32 => {
                type $t = i32;
                $body
            }
            DType::Uint32 => {
                type $t = u32;
                $body
            }
            DType::Float32 => {
                type $t = f32;
                $body
            }
            DType::Float64 => {
                type $t = f64;
                $body
            }
        }
    };
}

impl ArrayData {
    pub fn dtype(&self) -> DType {
        match self {
            ArrayData::Int8(_) => DType::Int8,
            ArrayData::Uint8(_) => DType::Uint8,
            ArrayData::Int16(_) => DType::Int16,
            ArrayData::Uint16(_) => DType::Uint16,
            ArrayData::Int32(_) => DType::Int32,
            ArrayData::Uint32(_) => DType::Uint32,
            ArrayData::Float32(_) => DType::Float32,
            ArrayData::Float64(_) => DType::Float64,
        }
    }

    pub fn len(&self) -> usize {
        with_data!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A shaped, typed, row-major array
#[derive(Debug, Clone, PartialEq)]
pub struct TypedArray {
    shape: Vec<usize>,
    data: ArrayData,
}

impl TypedArray {
    /// Build an array from flat values; the element count must equal the
    /// product of `shape`.
    pub fn from_vec<T: Element>(shape: Vec<usize>, values: Vec<T>) -> Result<Self, ArrayError> {
        let expected = element_count(&shape).unwrap_or(usize::MAX);
        if values.len() != expected {
            return Err(ArrayError::ElementCount {
                shape,
                expected,
                actual: values.len(),
            });
        }
        Ok(Self {
            shape,
            data: T::into_data(values),
        })
    }

    /// Zero-filled array of the given dtype and shape.
    pub fn zeros(dtype: DType, shape: Vec<usize>) -> Result<Self, ArrayError> {
        let Some(n) = byte_count(dtype, &shape).map(|bytes| bytes / dtype.size()) else {
            return Err(ArrayError::TooLarge { shape });
        };
        let data = with_dtype!(dtype, T => T::into_data(vec![<T as bytemuck::Zeroable>::zeroed(); n]));
        Ok(Self { shape, data })
    }

    /// Build an array of `dtype` from f64 values, checking each is representable.
    pub fn from_f64(dtype: DType, shape: Vec<usize>, values: &[f64]) -> Result<Self, ArrayError> {
        with_dtype!(dtype, T => {
            let converted = values
                .iter()
                .map(|&v| T::from_f64(v).ok_or(ArrayError::Cast { value: v, to: dtype }))
                .collect::<Result<Vec<T>, _>>()?;
            Self::from_vec(shape, converted)
        })
    }

    /// Decode a raw buffer. Fails unless `bytes.len() == dtype.size() * product(shape)`.
    ///
    /// The shape usually comes from the peer, so a product that overflows
    /// is reported as a size mismatch rather than trusted.
    pub fn from_bytes(dtype: DType, shape: Vec<usize>, bytes: &[u8]) -> Result<Self, ArrayError> {
        let Some(expected) = byte_count(dtype, &shape) else {
            return Err(ArrayError::BufferSize {
                expected: usize::MAX,
                actual: bytes.len(),
            });
        };
        if bytes.len() != expected {
            return Err(ArrayError::BufferSize {
                expected,
                actual: bytes.len(),
            });
        }
        let data = with_dtype!(dtype, T => T::into_data(bytemuck::pod_collect_to_vec::<u8, T>(bytes)));
        Ok(Self { shape, data })
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn byte_len(&self) -> usize {
        self.len() * self.dtype().size()
    }

    /// Typed view of the elements, if `T` matches the dtype.
    pub fn values<T: Element>(&self) -> Option<&[T]> {
        T::slice(&self.data)
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        with_data!(&self.data, v => v.iter().map(|&x| x.to_f64()).collect())
    }

    /// Convert to another dtype. Every element must be representable in the
    /// target (floats narrow to float32, integers must be integral and in range).
    pub fn cast(&self, dtype: DType) -> Result<TypedArray, ArrayError> {
        if dtype == self.dtype() {
            return Ok(self.clone());
        }
        Self::from_f64(dtype, self.shape.clone(), &self.to_f64_vec())
    }

    /// Raw contiguous element bytes for a binary attachment.
    pub fn to_bytes(&self) -> Bytes {
        with_data!(&self.data, v => Bytes::copy_from_slice(bytemuck::cast_slice(v.as_slice())))
    }

    /// Same shape and every element within `tolerance`. NaNs compare equal to NaNs.
    pub fn approx_eq(&self, other: &TypedArray, tolerance: f64) -> bool {
        if self.shape != other.shape {
            return false;
        }
        self.to_f64_vec()
            .iter()
            .zip(other.to_f64_vec().iter())
            .all(|(a, b)| (a.is_nan() && b.is_nan()) || a == b || (a - b).abs() <= tolerance)
    }
}

fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
}

/// Bytes needed for `shape` elements of `dtype`; `None` past `isize::MAX`.
fn byte_count(dtype: DType, shape: &[usize]) -> Option<usize> {
    element_count(shape)
        .and_then(|n| n.checked_mul(dtype.size()))
        .filter(|&bytes| bytes <= isize::MAX as usize)
}

/// Rank and per-dimension pattern an array must match; `None` leaves a
/// dimension unconstrained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapePattern(pub Vec<Option<usize>>);

impl ShapePattern {
    pub fn new<const N: usize>(dims: [Option<usize>; N]) -> Self {
        Self(dims.to_vec())
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn matches(&self, shape: &[usize]) -> bool {
        shape.len() == self.0.len()
            && self
                .0
                .iter()
                .zip(shape)
                .all(|(want, got)| want.map_or(true, |w| w == *got))
    }
}

impl fmt::Display for ShapePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self
            .0
            .iter()
            .map(|d| d.map_or_else(|| "None".to_string(), |n| n.to_string()))
            .collect();
        if dims.len() == 1 {
            write!(f, "({},)", dims[0])
        } else {
            write!(f, "({})", dims.join(", "))
        }
    }
}
